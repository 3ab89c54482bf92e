//! # bov-pre-processing
//!
//! Bag-of-vectors features for text classification: every document becomes
//! the mean of the pre-trained word vectors of its n-grams, for each
//! everygram order `1..=N`, written as one tab-separated matrix per order.
//!
//! ```no_run
//! use bov_pre_processing::{pipeline, progress::NoProgress, BuildParams};
//!
//! let params = BuildParams::new(2)?;
//! let report = pipeline::run(
//!     "models/vectors.txt",
//!     "corpus/tokenized/",
//!     "output/bov/",
//!     &params,
//!     &NoProgress,
//! )?;
//! println!("kept orders: {:?}", report.kept_orders().collect::<Vec<_>>());
//! # Ok::<(), bov_pre_processing::BovError>(())
//! ```

pub mod corpus;
mod error;
pub mod matrix;
pub mod pipeline;
pub mod pre_processor;
pub mod progress;

pub use error::{BovError, Result};
pub use pipeline::{BuildReport, CorpusMatrixBuilder, OrderReport};
pub use pre_processor::{BuildParams, DimensionPolicy, NgramOrder, VectorTable};
