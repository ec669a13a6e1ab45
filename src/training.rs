//! Training configuration assembly
//!
//! Turns a flat set of submitted form fields into one [`TrainingConfig`]
//! document. Layers arrive as indexed groups (`layers[0][type]`,
//! `layers[0][neurons]`, ...) and are rebuilt in index order by
//! [`fields::parse_layers`]. Nothing here runs training; the document is the
//! final output.

pub mod assembler;
pub mod config;
pub mod fields;

pub use assembler::{ConfigurationAssembler, parse_custom_metrics};
pub use config::{
    CallbackSettings, EarlyStopping, LayerKind, LayerSpec, OptimizerSettings, ReduceLrOnPlateau,
    TrainingConfig,
};
pub use fields::{FormFields, parse_layer, parse_layers};
