//! Decoding of operation payloads.
//!
//! Two wire formats are accepted and normalized into [`OperationRecord`]s:
//!
//! * an array of objects:
//!   `[{"action": "create", "path": "src/a.rs", "content": "..."}]`
//! * a document:
//!
//! ```xml
//! <file_operations>
//!   <operation action="replace" path="src/a.rs">
//!     <content><![CDATA[fn main() {}]]></content>
//!   </operation>
//!   <operation action="delete" path="old.rs"/>
//! </file_operations>
//! ```
//!
//! Missing `content` on `create`/`replace` decodes as an empty string in both
//! formats. Nothing here touches the filesystem.

use crate::domain::error::PayloadError;
use crate::domain::models::{Action, OperationRecord};
use log::debug;
use quick_xml::Reader;
use quick_xml::events::{BytesStart, Event};
use serde::Deserialize;

pub const WRAPPER_ELEMENT: &str = "file_operations";
pub const OPERATION_ELEMENT: &str = "operation";
pub const CONTENT_ELEMENT: &str = "content";

/// One decoded record, or the reason it is unusable.
pub type RecordResult = Result<OperationRecord, PayloadError>;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PayloadFormat {
    Json,
    Xml,
}

impl PayloadFormat {
    pub fn name(&self) -> &'static str {
        match self {
            PayloadFormat::Json => "JSON",
            PayloadFormat::Xml => "XML",
        }
    }

    pub fn detect(body: &str) -> Result<Self, PayloadError> {
        match body.trim_start().chars().next() {
            Some('[') => Ok(PayloadFormat::Json),
            Some('<') => Ok(PayloadFormat::Xml),
            Some(c) => Err(PayloadError::malformed(
                "operations",
                format!("expected a JSON array or an XML document, found {:?}", c),
            )),
            None => Err(PayloadError::malformed("operations", "payload is empty")),
        }
    }
}

/// Decode and validate every record. Fails on the first unusable record.
pub fn parse(raw: &str) -> Result<Vec<OperationRecord>, PayloadError> {
    decode(raw)?.into_iter().collect()
}

/// Decode the payload structure, leaving record-level validation results in
/// place so a caller can decide when to surface them.
pub fn decode(raw: &str) -> Result<Vec<RecordResult>, PayloadError> {
    let body = strip_code_fence(raw);
    let format = PayloadFormat::detect(body)?;
    debug!("Decoding {} payload ({} bytes)", format.name(), body.len());

    let raw_ops = match format {
        PayloadFormat::Json => decode_json(body)?,
        PayloadFormat::Xml => decode_xml(body)?,
    };

    Ok(raw_ops
        .into_iter()
        .enumerate()
        .map(|(i, op)| op.validate(i + 1))
        .collect())
}

/// Generated text often wraps a payload in a Markdown fence.
fn strip_code_fence(raw: &str) -> &str {
    let trimmed = raw.trim();
    if !trimmed.starts_with("```") {
        return trimmed;
    }
    let body = match trimmed.find('\n') {
        Some(i) => &trimmed[i + 1..],
        None => return trimmed,
    };
    body.trim_end().strip_suffix("```").unwrap_or(body).trim()
}

#[derive(Debug, Default, Deserialize)]
struct RawOperation {
    action: Option<String>,
    path: Option<String>,
    content: Option<String>,
}

impl RawOperation {
    fn validate(self, index: usize) -> RecordResult {
        let path = match self.path {
            Some(p) if !p.trim().is_empty() => p,
            _ => return Err(PayloadError::MissingPath { index }),
        };

        let action_text = self.action.unwrap_or_default();
        let action = Action::parse(action_text.trim()).ok_or_else(|| PayloadError::InvalidAction {
            index,
            action: action_text.clone(),
            path: path.clone(),
        })?;

        let content = match action {
            Action::Delete => String::new(),
            Action::Create | Action::Replace => self.content.unwrap_or_default(),
        };

        Ok(OperationRecord::new(action, path, content))
    }
}

fn decode_json(body: &str) -> Result<Vec<RawOperation>, PayloadError> {
    serde_json::from_str::<Vec<RawOperation>>(body)
        .map_err(|e| PayloadError::malformed(PayloadFormat::Json.name(), e.to_string()))
}

fn xml_error(reason: impl Into<String>) -> PayloadError {
    PayloadError::malformed(PayloadFormat::Xml.name(), reason)
}

fn element_name(e: &BytesStart<'_>) -> String {
    String::from_utf8_lossy(e.name().as_ref()).to_string()
}

fn operation_from_attributes(e: &BytesStart<'_>) -> Result<RawOperation, PayloadError> {
    let mut op = RawOperation::default();
    for attr in e.attributes() {
        let attr = attr.map_err(|err| xml_error(format!("bad attribute: {}", err)))?;
        let value = attr
            .unescape_value()
            .map_err(|err| xml_error(format!("bad attribute value: {}", err)))?
            .into_owned();
        match attr.key.as_ref() {
            b"action" => op.action = Some(value),
            b"path" => op.path = Some(value),
            _ => {}
        }
    }
    Ok(op)
}

/// Text and CDATA pieces of one `<content>` element.
#[derive(Default)]
struct ContentBuffer {
    segments: Vec<(bool, String)>,
}

impl ContentBuffer {
    fn push_text(&mut self, text: String) {
        self.segments.push((false, text));
    }

    fn push_cdata(&mut self, text: String) {
        self.segments.push((true, text));
    }

    /// With any CDATA present, whitespace-only text around it is layout, not content.
    fn finish(self) -> String {
        let has_cdata = self.segments.iter().any(|(cdata, _)| *cdata);
        self.segments
            .into_iter()
            .filter(|(cdata, text)| !has_cdata || *cdata || !text.trim().is_empty())
            .map(|(_, text)| text)
            .collect()
    }
}

fn decode_xml(body: &str) -> Result<Vec<RawOperation>, PayloadError> {
    let mut reader = Reader::from_str(body);
    let mut ops = Vec::new();
    let mut seen_wrapper = false;
    let mut in_wrapper = false;
    let mut current: Option<RawOperation> = None;
    let mut content: Option<ContentBuffer> = None;

    loop {
        let event = reader
            .read_event()
            .map_err(|e| xml_error(format!("{} at byte {}", e, reader.buffer_position())))?;

        match event {
            Event::Start(e) => {
                let name = element_name(&e);
                if !in_wrapper {
                    if seen_wrapper || name != WRAPPER_ELEMENT {
                        return Err(xml_error(format!(
                            "expected a single <{}> root element, found <{}>",
                            WRAPPER_ELEMENT, name
                        )));
                    }
                    seen_wrapper = true;
                    in_wrapper = true;
                } else if let Some(op) = current.as_ref() {
                    if content.is_some() {
                        return Err(xml_error(format!(
                            "element <{}> inside <{}>; wrap markup in CDATA",
                            name, CONTENT_ELEMENT
                        )));
                    }
                    if name != CONTENT_ELEMENT {
                        return Err(xml_error(format!(
                            "unexpected <{}> inside <{}>",
                            name, OPERATION_ELEMENT
                        )));
                    }
                    if op.content.is_some() {
                        return Err(xml_error(format!(
                            "more than one <{}> in one <{}>",
                            CONTENT_ELEMENT, OPERATION_ELEMENT
                        )));
                    }
                    content = Some(ContentBuffer::default());
                } else if name == OPERATION_ELEMENT {
                    current = Some(operation_from_attributes(&e)?);
                } else {
                    return Err(xml_error(format!(
                        "unexpected <{}> inside <{}>",
                        name, WRAPPER_ELEMENT
                    )));
                }
            }
            Event::Empty(e) => {
                let name = element_name(&e);
                if !in_wrapper {
                    if seen_wrapper || name != WRAPPER_ELEMENT {
                        return Err(xml_error(format!(
                            "expected a single <{}> root element, found <{}/>",
                            WRAPPER_ELEMENT, name
                        )));
                    }
                    seen_wrapper = true;
                } else if let Some(op) = current.as_mut() {
                    if content.is_some() || name != CONTENT_ELEMENT || op.content.is_some() {
                        return Err(xml_error(format!(
                            "unexpected <{}/> inside <{}>",
                            name, OPERATION_ELEMENT
                        )));
                    }
                    op.content = Some(String::new());
                } else if name == OPERATION_ELEMENT {
                    ops.push(operation_from_attributes(&e)?);
                } else {
                    return Err(xml_error(format!(
                        "unexpected <{}/> inside <{}>",
                        name, WRAPPER_ELEMENT
                    )));
                }
            }
            Event::End(_) => {
                if let Some(buffer) = content.take() {
                    if let Some(op) = current.as_mut() {
                        op.content = Some(buffer.finish());
                    }
                } else if let Some(op) = current.take() {
                    ops.push(op);
                } else {
                    in_wrapper = false;
                }
            }
            Event::Text(t) => {
                let text = t
                    .unescape()
                    .map_err(|e| xml_error(format!("bad text: {}", e)))?
                    .into_owned();
                match content.as_mut() {
                    Some(buffer) => buffer.push_text(text),
                    None if text.trim().is_empty() => {}
                    None => {
                        return Err(xml_error(format!(
                            "text outside a <{}> element: {:?}",
                            CONTENT_ELEMENT,
                            text.trim()
                        )));
                    }
                }
            }
            Event::CData(c) => {
                let text = String::from_utf8(c.into_inner().into_owned())
                    .map_err(|e| xml_error(format!("CDATA is not UTF-8: {}", e)))?;
                match content.as_mut() {
                    Some(buffer) => buffer.push_cdata(text),
                    None => {
                        return Err(xml_error(format!(
                            "CDATA outside a <{}> element",
                            CONTENT_ELEMENT
                        )));
                    }
                }
            }
            Event::Eof => break,
            _ => {}
        }
    }

    if !seen_wrapper {
        return Err(xml_error(format!("missing <{}> element", WRAPPER_ELEMENT)));
    }
    if in_wrapper {
        return Err(xml_error(format!("unclosed <{}> element", WRAPPER_ELEMENT)));
    }

    Ok(ops)
}
