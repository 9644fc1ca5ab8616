use thiserror::Error;

/// Errors raised by the runtime and the simulator backends.
#[derive(Debug, Error)]
pub enum SimError {
    #[error("no simulator object named '{0}'")]
    NoSuchObject(String),

    #[error("object '{name}' has no bit {index}")]
    IndexOutOfRange { name: String, index: u32 },

    #[error("object '{0}' can't be written from the testbench")]
    NotWritable(String),

    #[error("object '{0}' does not carry a value")]
    NoValue(String),

    #[error("can't set '{name}' to '{value}': {reason}")]
    InvalidValue {
        name: String,
        value: String,
        reason: &'static str,
    },

    #[error("writes are not allowed in the read-only phase")]
    ReadOnlyPhase,

    #[error("unknown time unit '{0}'")]
    TimeUnit(String),

    #[error("can't convert {time} {unit} to sim steps without rounding (sim precision: 1e{precision} s)")]
    TimeRounding { time: f64, unit: String, precision: i8 },

    #[error("callback handle {0} is not registered")]
    UnknownCallback(usize),

    #[error("simulator rejected request: {0}")]
    Simulator(String),

    #[error("no simulator interface installed on this thread")]
    NoInterface,

    #[error("values did not settle after {0} delta cycles")]
    DeltaOverflow(u32),

    #[error("invalid circuit: {0}")]
    Circuit(String),

    #[error("invalid configuration {key}={value}")]
    Config { key: String, value: String },

    #[error("failed to write test report: {0}")]
    Report(String),

    #[error(transparent)]
    Io(#[from] std::io::Error),
}

pub type SimResult<T> = Result<T, SimError>;
