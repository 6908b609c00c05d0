//! XML response parsing
//!
//! Response bodies are read into a small element tree first. The tree is only
//! built from a well-formed document with exactly one root element; text
//! outside the root, mismatched or unclosed tags and malformed entities are all
//! parse errors. Every field reader works on that tree, so a body is either
//! fully understood or rejected.
//!
//! Text is kept verbatim: object keys and prefixes may begin or end with
//! spaces. Only scalar fields are trimmed, where they are read.

use crate::{
    types::{ListingPage, ObjectSummary, PartListing, PartSummary},
    ClientError, Result,
};
use quick_xml::{events::Event, Reader};

/// Scalar response fields that can be extracted on their own
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ResponseField {
    ETag,
    UploadId,
    NextContinuationToken,
    IsTruncated,
}

impl ResponseField {
    /// Element name carrying this field
    pub fn element_name(self) -> &'static str {
        match self {
            Self::ETag => "ETag",
            Self::UploadId => "UploadId",
            Self::NextContinuationToken => "NextContinuationToken",
            Self::IsTruncated => "IsTruncated",
        }
    }
}

/// Error details carried by a service error body
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct ServiceErrorBody {
    pub code: Option<String>,
    pub message: Option<String>,
    pub request_id: Option<String>,
}

#[derive(Debug, Default)]
struct Element {
    name: String,
    text: String,
    children: Vec<Element>,
}

impl Element {
    fn new(name: String) -> Self {
        Self {
            name,
            ..Default::default()
        }
    }

    fn child(&self, name: &str) -> Option<&Element> {
        self.children.iter().find(|c| c.name == name)
    }

    fn children<'a>(&'a self, name: &'a str) -> impl Iterator<Item = &'a Element> + 'a {
        self.children.iter().filter(move |c| c.name == name)
    }

    fn child_text(&self, name: &str) -> Option<&str> {
        self.child(name).map(|c| c.text.as_str())
    }

    fn child_scalar(&self, name: &str) -> Option<&str> {
        self.child_text(name).map(str::trim)
    }

    fn required_text(&self, name: &str) -> Result<&str> {
        self.child_text(name).ok_or_else(|| {
            ClientError::Parse(format!("<{}> is missing <{}>", self.name, name))
        })
    }

    /// First element named `name` anywhere in this subtree, depth first
    fn find(&self, name: &str) -> Option<&Element> {
        if self.name == name {
            return Some(self);
        }
        self.children.iter().find_map(|c| c.find(name))
    }
}

fn parse_error(message: impl Into<String>) -> ClientError {
    ClientError::Parse(message.into())
}

fn element_name(raw: &[u8]) -> Result<String> {
    std::str::from_utf8(raw)
        .map(str::to_string)
        .map_err(|e| parse_error(format!("element name is not UTF-8: {}", e)))
}

fn attach(stack: &mut Vec<Element>, root: &mut Option<Element>, element: Element) -> Result<()> {
    if let Some(parent) = stack.last_mut() {
        // Whitespace ahead of the first child is indentation, not text
        if parent.children.is_empty() && parent.text.trim().is_empty() {
            parent.text.clear();
        }
        parent.children.push(element);
        return Ok(());
    }
    if root.is_some() {
        return Err(parse_error(format!(
            "unexpected second root element <{}>",
            element.name
        )));
    }
    *root = Some(element);
    Ok(())
}

fn append_text(stack: &mut [Element], root: &Option<Element>, text: &str) -> Result<()> {
    match stack.last_mut() {
        Some(element) if !element.children.is_empty() && text.trim().is_empty() => Ok(()),
        Some(element) => {
            element.text.push_str(text);
            Ok(())
        }
        None if text.trim().is_empty() => Ok(()),
        None if root.is_some() => Err(parse_error("text after the root element")),
        None => Err(parse_error("text before the root element")),
    }
}

fn parse_document(xml: &str) -> Result<Element> {
    let mut reader = Reader::from_str(xml);

    let mut stack: Vec<Element> = Vec::new();
    let mut root: Option<Element> = None;

    loop {
        match reader.read_event() {
            Ok(Event::Start(e)) => {
                if stack.is_empty() && root.is_some() {
                    return Err(parse_error("unexpected second root element"));
                }
                stack.push(Element::new(element_name(e.local_name().as_ref())?));
            }
            Ok(Event::Empty(e)) => {
                let element = Element::new(element_name(e.local_name().as_ref())?);
                attach(&mut stack, &mut root, element)?;
            }
            Ok(Event::End(_)) => {
                let element = stack
                    .pop()
                    .ok_or_else(|| parse_error("closing tag without an opening tag"))?;
                attach(&mut stack, &mut root, element)?;
            }
            Ok(Event::Text(e)) => {
                let text = e
                    .unescape()
                    .map_err(|err| parse_error(format!("invalid text: {}", err)))?;
                append_text(&mut stack, &root, &text)?;
            }
            Ok(Event::CData(e)) => {
                let raw = e.into_inner();
                let text = std::str::from_utf8(&raw)
                    .map_err(|err| parse_error(format!("CDATA is not UTF-8: {}", err)))?;
                append_text(&mut stack, &root, text)?;
            }
            Ok(Event::Eof) => break,
            // Declarations, comments, processing instructions and doctypes carry no data.
            Ok(_) => {}
            Err(e) => {
                return Err(parse_error(format!(
                    "{} at position {}",
                    e,
                    reader.buffer_position()
                )))
            }
        }
    }

    if let Some(open) = stack.last() {
        return Err(parse_error(format!("unclosed element <{}>", open.name)));
    }
    root.ok_or_else(|| parse_error("document has no root element"))
}

fn parse_number<T: std::str::FromStr>(element: &str, text: &str) -> Result<T> {
    text.trim()
        .parse()
        .map_err(|_| parse_error(format!("<{}> is not a number: {:?}", element, text)))
}

/// Only the literal `true` counts
fn is_true(text: Option<&str>) -> bool {
    text.map(str::trim) == Some("true")
}

/// Trimmed scalar text, `None` when blank
fn non_empty(text: Option<&str>) -> Option<String> {
    text.map(str::trim).filter(|t| !t.is_empty()).map(str::to_string)
}

fn strip_quotes(etag: &str) -> String {
    etag.trim().trim_matches('"').to_string()
}

/// Extract one scalar field from a response document
///
/// The whole document must be well-formed. Returns `None` when the field is
/// absent. ETags come back without quotes.
pub fn extract_field(xml: &str, field: ResponseField) -> Result<Option<String>> {
    let root = parse_document(xml)?;
    let value = root.find(field.element_name()).map(|e| e.text.trim());
    Ok(match field {
        ResponseField::ETag => value.map(strip_quotes),
        _ => value.map(str::to_string),
    })
}

/// Parse a `ListBucketResult` (list-type=2) page
///
/// `next_continuation_token` is set exactly when the page is truncated; a
/// truncated page without a token is rejected.
pub fn parse_list_objects(xml: &str) -> Result<ListingPage> {
    let root = parse_document(xml)?;
    if root.name != "ListBucketResult" {
        return Err(parse_error(format!(
            "expected <ListBucketResult>, found <{}>",
            root.name
        )));
    }

    let is_truncated = is_true(root.child_text("IsTruncated"));
    let token = non_empty(root.child_text("NextContinuationToken"));
    let next_continuation_token = match (is_truncated, token) {
        (true, Some(token)) => Some(token),
        (true, None) => {
            return Err(parse_error(
                "truncated listing without <NextContinuationToken>",
            ))
        }
        (false, _) => None,
    };

    let objects = root
        .children("Contents")
        .map(|contents| -> Result<ObjectSummary> {
            Ok(ObjectSummary {
                key: contents.required_text("Key")?.to_string(),
                size: contents
                    .child_scalar("Size")
                    .and_then(|size| size.parse().ok())
                    .unwrap_or(0),
                last_modified: non_empty(contents.child_text("LastModified")),
                etag: non_empty(contents.child_text("ETag")).map(|e| strip_quotes(&e)),
                storage_class: non_empty(contents.child_text("StorageClass")),
            })
        })
        .collect::<Result<Vec<_>>>()?;

    let prefixes = root
        .children("CommonPrefixes")
        .flat_map(|common| common.children("Prefix"))
        .map(|prefix| prefix.text.clone())
        .filter(|prefix| !prefix.is_empty())
        .collect();

    Ok(ListingPage {
        objects,
        prefixes,
        is_truncated,
        next_continuation_token,
    })
}

/// Parse a `CopyObjectResult` and return its ETag
pub fn parse_copy_object(xml: &str) -> Result<String> {
    let root = parse_document(xml)?;
    root.required_text("ETag").map(strip_quotes)
}

/// Parse an `InitiateMultipartUploadResult` and return the upload id
pub fn parse_initiate_multipart(xml: &str) -> Result<String> {
    let root = parse_document(xml)?;
    let upload_id = root.required_text("UploadId")?.trim();
    if upload_id.is_empty() {
        return Err(parse_error("<UploadId> is empty"));
    }
    Ok(upload_id.to_string())
}

/// Parse a `CompleteMultipartUploadResult` and return the final ETag
pub fn parse_complete_multipart(xml: &str) -> Result<String> {
    let root = parse_document(xml)?;
    root.required_text("ETag").map(strip_quotes)
}

/// Parse a `ListPartsResult`
pub fn parse_list_parts(xml: &str) -> Result<PartListing> {
    let root = parse_document(xml)?;
    if root.name != "ListPartsResult" {
        return Err(parse_error(format!(
            "expected <ListPartsResult>, found <{}>",
            root.name
        )));
    }

    let mut parts = root
        .children("Part")
        .map(|part| -> Result<PartSummary> {
            Ok(PartSummary {
                part_number: parse_number("PartNumber", part.required_text("PartNumber")?)?,
                etag: strip_quotes(part.required_text("ETag")?),
                size: match part.child_text("Size") {
                    Some(size) => parse_number("Size", size)?,
                    None => 0,
                },
                last_modified: non_empty(part.child_text("LastModified")),
            })
        })
        .collect::<Result<Vec<_>>>()?;
    parts.sort_by_key(|part| part.part_number);

    let is_truncated = is_true(root.child_text("IsTruncated"));
    let next_part_number_marker = match non_empty(root.child_text("NextPartNumberMarker")) {
        Some(marker) if is_truncated => Some(parse_number("NextPartNumberMarker", &marker)?),
        _ => None,
    };

    Ok(PartListing {
        parts,
        is_truncated,
        next_part_number_marker,
    })
}

/// Read code, message and request id from an error body
///
/// Bodies that are empty or not XML yield empty details.
pub fn parse_error_body(xml: &str) -> ServiceErrorBody {
    match parse_document(xml) {
        Ok(root) if root.name == "Error" => ServiceErrorBody {
            code: non_empty(root.child_text("Code")),
            message: non_empty(root.child_text("Message")),
            request_id: non_empty(root.child_text("RequestId")),
        },
        _ => ServiceErrorBody::default(),
    }
}
