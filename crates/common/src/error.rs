use thiserror::Error;

#[derive(Error, Debug)]
pub enum Error {
    #[error("invalid name: {0}")]
    InvalidName(String),

    #[error("path escapes image root")]
    PathEscapesRoot,

    #[error("person not found")]
    PersonNotFound,

    #[error("image not found")]
    ImageNotFound,

    #[error("invalid file type")]
    InvalidFileType,

    #[error("{0}")]
    MissingField(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl Error {
    /// True for errors caused by the caller's input rather than the server.
    pub fn is_client_error(&self) -> bool {
        matches!(
            self,
            Error::InvalidName(_)
                | Error::PathEscapesRoot
                | Error::InvalidFileType
                | Error::MissingField(_)
        )
    }

    pub fn is_not_found(&self) -> bool {
        matches!(self, Error::PersonNotFound | Error::ImageNotFound)
    }
}

pub type Result<T> = std::result::Result<T, Error>;
