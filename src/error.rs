use snafu::Snafu;

#[derive(Snafu, Debug, Clone, PartialEq)]
#[snafu(visibility(pub(crate)))]
pub enum SrsError {
    InvalidConfiguration,
    #[snafu(display("storage failure: {message}"))]
    Storage { message: String },
    #[snafu(display("hook failure: {message}"))]
    Hook { message: String },
}

pub type Result<T, E = SrsError> = std::result::Result<T, E>;
