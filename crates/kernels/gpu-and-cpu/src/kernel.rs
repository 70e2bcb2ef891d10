//! Draw expansion kernel. Turns each lane's share of draw descriptors into indirect draw commands.

/// The kernel. One call does one lane's worth of work.
///
/// Lanes never share an output slot, so any number of them can run at the same time, in any
/// order, without synchronisation.
#[inline]
pub fn kernel(
    // The lane that decides which draw IDs to expand. Lanes at or beyond `constants.lanes` are
    // idle, they only exist because dispatches come in whole workgroups.
    lane_id: u32,
    // Constants for the dispatch.
    constants: &crate::constants::Constants,
    // Every draw in the batch. Only the first `constants.draw_count` are read.
    descriptors: &[crate::command::DrawDescriptor],
    // The indirect buffer. Only the first `constants.draw_count` are written.
    commands: &mut [crate::command::DrawCommand],
) {
    let lane = crate::lanes::LaneRange::for_lane(lane_id, constants);

    for draw_id in lane.start..lane.end {
        #[expect(
            clippy::as_conversions,
            reason = "This needs to run on the GPU where fallibility isn't possible"
        )]
        let index = draw_id as usize;
        commands[index] = crate::command::DrawCommand::expand(draw_id, &descriptors[index]);
    }
}

#[expect(
    clippy::as_conversions,
    clippy::indexing_slicing,
    reason = "These are just tests"
)]
