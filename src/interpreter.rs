//! Command interpreter for composed user input
//!
//! Decides what an outgoing message actually is:
//!
//! - the text shown in the transcript versus the payload sent to the service,
//!   with attachment context folded into the payload only
//! - a plain completion request or an image-generation request, selected by
//!   the reserved `/image` prefix

use crate::extractor::Attachment;

/// Reserved prefix that switches a request to image generation
pub const IMAGE_COMMAND_PREFIX: &str = "/image";

/// Question used when a document is attached without any typed text
pub const DEFAULT_DOCUMENT_QUESTION: &str = "Summarize this document";

/// An outgoing message split into what is shown and what is sent
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ComposedInput {
    /// Human-readable text recorded as the user message
    pub display: String,
    /// Full request text, including any attachment context
    pub payload: String,
}

/// Kind of request a composed input maps to
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Classified {
    /// A text completion request
    Text {
        /// Text sent to the completion endpoint
        payload: String,
    },
    /// An image-generation request
    Image {
        /// Prompt sent to the image endpoint
        prompt: String,
    },
}

/// Combine typed text with an optional attachment
///
/// Returns `None` when there is nothing to send.
///
/// # Examples
///
/// ```
/// use chatdeck::extractor::Attachment;
/// use chatdeck::interpreter::compose;
///
/// let attachment = Attachment {
///     name: "report.txt".to_string(),
///     extracted_text: "Q1 results".to_string(),
///     mime_type: "text/plain".to_string(),
/// };
/// let composed = compose("", Some(&attachment)).unwrap();
/// assert_eq!(composed.display, "Analyzed document: report.txt");
/// assert!(composed.payload.contains("Context from file (report.txt):"));
/// assert!(composed.payload.contains("Q1 results"));
///
/// assert!(compose("   ", None).is_none());
/// ```
pub fn compose(text: &str, attachment: Option<&Attachment>) -> Option<ComposedInput> {
    let question = text.trim();

    match attachment {
        None if question.is_empty() => None,
        None => Some(ComposedInput {
            display: question.to_string(),
            payload: question.to_string(),
        }),
        Some(attachment) => {
            let display = if question.is_empty() {
                format!("Analyzed document: {}", attachment.name)
            } else {
                question.to_string()
            };
            let asked = if question.is_empty() {
                DEFAULT_DOCUMENT_QUESTION
            } else {
                question
            };
            let payload = format!(
                "Context from file ({}):\n\n{}\n\nUser Question: {}",
                attachment.name, attachment.extracted_text, asked
            );
            Some(ComposedInput { display, payload })
        }
    }
}

/// Classify a composed input as a text or image request
///
/// The input is an image request when it starts with `/image ` and the rest
/// is non-blank; the rest, trimmed, is the prompt.
///
/// # Examples
///
/// ```
/// use chatdeck::interpreter::{classify, Classified};
///
/// assert_eq!(
///     classify("/image a red fox"),
///     Classified::Image { prompt: "a red fox".to_string() }
/// );
/// assert_eq!(
///     classify("hello"),
///     Classified::Text { payload: "hello".to_string() }
/// );
/// ```
pub fn classify(raw: &str) -> Classified {
    let image_prompt = raw
        .strip_prefix(IMAGE_COMMAND_PREFIX)
        .and_then(|rest| rest.strip_prefix(' '))
        .map(str::trim)
        .filter(|prompt| !prompt.is_empty());

    match image_prompt {
        Some(prompt) => Classified::Image {
            prompt: prompt.to_string(),
        },
        None => Classified::Text {
            payload: raw.to_string(),
        },
    }
}
