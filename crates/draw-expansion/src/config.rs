//! Defines all the CLI arguments.

/// `Config`
#[derive(clap::Parser, Debug)]
#[clap(author, version)]
#[command(name = "draw-expansion")]
#[command(
    about = "Expand compact draw descriptors into indexed indirect draw commands, on the CPU or GPU."
)]
pub struct Config {
    #[command(subcommand)]
    /// The subcommand.
    pub command: Commands,
}

/// CLI subcommand.
#[derive(clap::Subcommand, Debug)]
pub enum Commands {
    /// Expand a file of draw descriptors as-is.
    Expand(Expand),
    /// Allocate each descriptor's vertex and index counts into a draw batch, then expand the
    /// batch.
    Batch(Batch),
}

/// Options shared by every subcommand that dispatches the kernel.
#[derive(clap::Args, Debug, Clone)]
pub struct Dispatch {
    /// Where to run the kernel.
    #[arg(
        long,
        value_enum,
        value_name = "The method of running the kernel",
        default_value_t = Backend::Cpu
    )]
    pub backend: Backend,

    /// The number of parallel lanes to partition the draws across.
    #[arg(
        long,
        value_name = "Number of lanes",
        default_value_t = kernel::constants::DEFAULT_LANES,
        value_parser = clap::value_parser!(u32).range(1..)
    )]
    pub lanes: u32,

    /// How draws are shared out between lanes.
    #[arg(
        long,
        value_enum,
        value_name = "Lane partition",
        default_value_t = Partition::Padded
    )]
    pub partition: Partition,

    /// Save the raw indirect buffer here instead of printing a table.
    #[arg(long, value_name = "Path to save the indirect buffer to")]
    pub output: Option<std::path::PathBuf>,
}

/// Arguments to the `expand` subcommand.
#[derive(clap::Parser, Debug)]
pub struct Expand {
    /// Options for running the kernel.
    #[command(flatten)]
    pub dispatch: Dispatch,

    /// A text file with one `vertex_start vertex_count index_start index_count` descriptor per
    /// line.
    #[arg(value_name = "Path to the descriptors file")]
    pub input: std::path::PathBuf,
}

/// Arguments to the `batch` subcommand.
#[derive(clap::Parser, Debug)]
pub struct Batch {
    /// Options for running the kernel.
    #[command(flatten)]
    pub dispatch: Dispatch,

    /// The number of vertices, and separately indices, each batch has room for. Draws that
    /// don't fit spill into a new batch.
    #[arg(long, value_name = "Batch capacity", default_value_t = 100_000)]
    pub capacity: u32,

    /// A text file of descriptors. Only the vertex and index counts are used, the batch decides
    /// where they go.
    #[arg(value_name = "Path to the descriptors file")]
    pub input: std::path::PathBuf,
}

/// Where to run the computations.
#[derive(clap::ValueEnum, Clone, Copy, Debug, PartialEq, Eq)]
pub enum Backend {
    /// Run every lane one after the other on the current thread.
    Cpu,
    /// Run lanes on a pool of CPU threads.
    Threads,
    /// A compute shader run on the GPU via `wgpu`.
    Gpu,
}

/// How to share draws out between lanes.
#[derive(clap::ValueEnum, Clone, Copy, Debug, PartialEq, Eq)]
pub enum Partition {
    /// Chunks of `N / L + 1`, clamped to `N`. Tail lanes may be idle.
    Padded,
    /// Every lane gets `N / L` or `N / L + 1` draws.
    Balanced,
}

impl Partition {
    /// The kernel flags for this partition.
    pub const fn kernel_flags(self) -> u32 {
        match self {
            Self::Padded => 0,
            Self::Balanced => kernel::constants::Flag::BalancedLanes.bit(),
        }
    }
}

#[cfg(test)]
mod test {
    use clap::Parser as _;

    use super::*;

    #[test]
    fn defaults() {
        let config = Config::parse_from(["draw-expansion", "expand", "draws.txt"]);
        let Commands::Expand(expand) = config.command else {
            panic!("Expected the `expand` subcommand");
        };
        assert_eq!(expand.dispatch.backend, Backend::Cpu);
        assert_eq!(expand.dispatch.lanes, 64);
        assert_eq!(expand.dispatch.partition, Partition::Padded);
        assert!(expand.dispatch.output.is_none());
        assert_eq!(expand.input, std::path::PathBuf::from("draws.txt"));
    }

    #[test]
    fn zero_lanes_is_rejected() {
        let result = Config::try_parse_from(["draw-expansion", "expand", "--lanes", "0", "in.txt"]);
        assert!(result.is_err());
    }

    #[test]
    fn batch_options() {
        let config = Config::parse_from([
            "draw-expansion",
            "batch",
            "--backend",
            "threads",
            "--partition",
            "balanced",
            "--capacity",
            "500",
            "draws.txt",
        ]);
        let Commands::Batch(batch) = config.command else {
            panic!("Expected the `batch` subcommand");
        };
        assert_eq!(batch.dispatch.backend, Backend::Threads);
        assert_eq!(batch.dispatch.partition, Partition::Balanced);
        assert_eq!(batch.capacity, 500);
    }

    #[test]
    fn partition_flags() {
        assert_eq!(Partition::Padded.kernel_flags(), 0);
        assert_eq!(
            Partition::Balanced.kernel_flags(),
            kernel::constants::Flag::BalancedLanes.bit()
        );
    }
}
