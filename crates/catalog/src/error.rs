use thiserror::Error;

pub type Result<T> = std::result::Result<T, CatalogError>;

#[derive(Error, Debug)]
pub enum CatalogError {
    #[error("failed to read catalog file: {0}")]
    Io(#[from] std::io::Error),

    #[error("failed to parse catalog: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("region '{region}' expands to no location codes")]
    EmptyRegion { region: String },

    #[error("denominator '{name}' references unknown source '{source_id}'")]
    UnknownDenominatorSource { name: String, source_id: String },

    #[error("denominator '{name}' references unknown metric '{metric}' on source '{source_id}'")]
    UnknownDenominatorMetric {
        name: String,
        source_id: String,
        metric: String,
    },

    #[error("location '{name}' has an empty code")]
    EmptyLocationCode { name: String },
}
