//! Earnings-call transcript segmentation and signal extraction.
//!
//! Raw text flows through [`transcriptparser`] (speaker turns), [`sections`]
//! (prepared remarks vs. Q&A), [`signals`] (sentiment histograms and strategic
//! focuses) and [`longitudinal`] (quarter-over-quarter deltas).
//! [`pipeline::TickerPipeline`] ties them together for one ticker.

pub mod classifier;
pub mod config;
pub mod error;
pub mod focus;
pub mod logging;
pub mod longitudinal;
pub mod narrative;
pub mod pdftext;
pub mod pipeline;
pub mod quarter;
pub mod sections;
pub mod sentiment;
pub mod signals;
pub mod store;
pub mod transcriptparser;

pub use classifier::{build_classifier, Classification, Classifier, Label, ModelOutput};
pub use config::AnalyzerConfig;
pub use error::{Result, SignalError};
pub use focus::{FocusExtractor, NoveltyMemory, Taxonomy};
pub use longitudinal::{deltas, DeltaRecord, SignalReport};
pub use pipeline::TickerPipeline;
pub use quarter::QuarterId;
pub use sections::{partition, OperatorCueDetector, SectionBoundaryDetector, Transcript};
pub use sentiment::SectionSignal;
pub use signals::{QuarterSignalBundle, SignalExtractor};
pub use transcriptparser::{RawTranscript, RegexSpeakerTokenizer, SpeakerTokenizer, Utterance};
