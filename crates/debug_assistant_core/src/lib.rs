pub mod assistant;
pub mod composer;
pub mod credentials;
pub mod domain;
pub mod encoder;
pub mod parser;
pub mod ports;
pub mod session;

pub use assistant::{AnalysisOutcome, DebugAssistant};
pub use composer::{ChatRequest, ComposedRequest, PromptComposer, ResponseFormat};
pub use credentials::ApiKey;
pub use domain::{AnalysisResult, ContentPart, Message, Role};
pub use encoder::{EncodedImage, ImageEncoder, ImageMime};
pub use parser::parse_analysis;
pub use ports::{AssistantError, AssistantResult, ModelService};
pub use session::Session;
