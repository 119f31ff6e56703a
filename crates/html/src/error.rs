use rich_editor_core::RawError;

#[derive(Debug, thiserror::Error)]
pub enum ImportError {
    #[error("HTML nesting deeper than {0} elements")]
    NestingTooDeep(usize),
    #[error(transparent)]
    Raw(#[from] RawError),
}

pub type Result<T> = std::result::Result<T, ImportError>;
