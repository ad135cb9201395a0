use std::str;

use anyhow::{anyhow, Result};
use quick_xml::events::{BytesEnd, BytesStart, Event};
use quick_xml::reader::Reader;

/// One `<d:response>` entry of a PROPFIND multistatus body.
#[derive(Debug, Default)]
pub struct DavResponse {
    pub href: String,
    pub is_collection: bool,
    pub status_ok: bool,
}

/// Parses a WebDAV 207 body far enough to prove it is structurally what an
/// authenticated PROPFIND should return. Anything that is not a multistatus
/// document is an error.
pub fn parse_multistatus(xml_text: &str) -> Result<Vec<DavResponse>> {
    let mut reader = Reader::from_str(xml_text);
    reader.config_mut().trim_text(true);

    let mut responses = Vec::new();
    let mut current: Option<DavResponse> = None;
    let mut current_element = String::new();
    let mut in_resourcetype = false;
    let mut saw_multistatus = false;
    let mut buf = Vec::new();

    loop {
        match reader.read_event_into(&mut buf) {
            Ok(Event::Start(e)) | Ok(Event::Empty(e)) => {
                let name = local_name(&e)?;
                match name.as_str() {
                    "multistatus" => saw_multistatus = true,
                    "response" => current = Some(DavResponse::default()),
                    "resourcetype" => in_resourcetype = true,
                    "collection" if in_resourcetype => {
                        if let Some(response) = current.as_mut() {
                            response.is_collection = true;
                        }
                    }
                    _ => current_element = name,
                }
            }
            Ok(Event::Text(e)) => {
                let text = e.unescape()?.to_string();
                if let Some(response) = current.as_mut() {
                    match current_element.as_str() {
                        "href" => {
                            let trimmed = text.trim();
                            response.href = urlencoding::decode(trimmed)
                                .map(|decoded| decoded.into_owned())
                                .unwrap_or_else(|_| trimmed.to_string());
                        }
                        "status" => {
                            if text.contains("200") {
                                response.status_ok = true;
                            }
                        }
                        _ => {}
                    }
                }
            }
            Ok(Event::End(e)) => {
                let name = local_name_end(&e)?;
                match name.as_str() {
                    "response" => {
                        if let Some(response) = current.take() {
                            responses.push(response);
                        }
                    }
                    "resourcetype" => in_resourcetype = false,
                    _ => {}
                }
            }
            Ok(Event::Eof) => break,
            Err(e) => return Err(anyhow!("XML parsing error: {}", e)),
            _ => {}
        }
        buf.clear();
    }

    if !saw_multistatus {
        return Err(anyhow!("response body is not a DAV multistatus document"));
    }
    Ok(responses)
}

fn local_name(e: &BytesStart) -> Result<String> {
    let name = e.name();
    let local = name.local_name();
    Ok(str::from_utf8(local.as_ref())?.to_string())
}

fn local_name_end(e: &BytesEnd) -> Result<String> {
    let name = e.name();
    let local = name.local_name();
    Ok(str::from_utf8(local.as_ref())?.to_string())
}
