//! LLM integration for qa-forge.
//!
//! Both pipeline stages, and the evolution model that proposes new candidates,
//! talk to a language model through the [`LlmProvider`] trait. The bundled
//! [`OpenAiClient`] speaks the OpenAI-compatible chat completion protocol.
//!
//! ```ignore
//! use qa_forge::llm::{GenerationRequest, LlmProvider, Message, OpenAiClient};
//!
//! let client = OpenAiClient::from_env()?;
//! let request = GenerationRequest::new(
//!     "gpt-4o-mini",
//!     vec![Message::system("Answer concisely."), Message::user("Question: 2 + 2?")],
//! )
//! .with_max_tokens(16);
//! let answer = client.generate(request).await?.completion_text()?;
//! ```

pub mod client;
pub mod types;

pub use client::{OpenAiClient, DEFAULT_MODEL, OPENAI_BASE_URL};
pub use types::{Choice, GenerationRequest, GenerationResponse, LlmProvider, Message, Usage};
