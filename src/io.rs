use crate::compartment_container::CompartmentContainer;
use crate::config::{self, CompartmentConfig};
use crate::error::{CompartmentError, Result};
use crate::profile_scope;
use crate::value_item::{Value, ValueItem, ValueItemContainer};
use flate2::{read::GzDecoder, write::GzEncoder, Compression};
use quick_xml::events::{BytesDecl, BytesEnd, BytesStart, BytesText, Event};
use quick_xml::{Reader, Writer};
use serde::{Deserialize, Serialize};
use std::io::{BufWriter, Cursor, Read, Write};
use std::path::Path;


const ROOT_TAG: &str = "CompartmentContainer";
const VERSION_TAG: &str = "Version";
const ITEMS_TAG: &str = "ValueItemContainer";
const ITEM_TAG: &str = "ValueItem";
const VALUE_TAG: &str = "Value";
const MATRIX_TAG: &str = "Matrix";
const ROW_TAG: &str = "Row";
const CELL_TAG: &str = "Cell";

/// On-disk encoding of a saved container.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize, clap::ValueEnum)]
pub enum SaveFormat {
    #[default]
    Xml,
    Json,
    Binary,
}

impl SaveFormat {
    /// Guesses the format from the file extension, ignoring a trailing `.gz`.
    pub fn from_path<P: AsRef<Path>>(path: P) -> Option<Self> {
        let path = path.as_ref();
        let path = if path.extension().is_some_and(|e| e == "gz") {
            path.with_extension("")
        } else {
            path.to_path_buf()
        };
        match path.extension()?.to_str()? {
            "xml" => Some(SaveFormat::Xml),
            "json" => Some(SaveFormat::Json),
            "bin" => Some(SaveFormat::Binary),
            _ => None,
        }
    }
}

fn write_text_element(writer: &mut Writer<Vec<u8>>, tag: &str, text: &str) -> Result<()> {
    writer.write_event(Event::Start(BytesStart::new(tag)))?;
    // always emit the text event so the indenter keeps empty values inline
    writer.write_event(Event::Text(BytesText::new(text)))?;
    writer.write_event(Event::End(BytesEnd::new(tag)))?;
    Ok(())
}

/// Writes records as versioned XML.
pub fn write_value_items_xml(items: &ValueItemContainer) -> Result<String> {
    profile_scope!("write_value_items_xml");
    let mut writer = Writer::new_with_indent(Vec::new(), b' ', 2);
    writer.write_event(Event::Decl(BytesDecl::new("1.0", Some("UTF-8"), None)))?;
    writer.write_event(Event::Start(BytesStart::new(ROOT_TAG)))?;
    write_text_element(&mut writer, VERSION_TAG, config::XML_VERSION)?;
    writer.write_event(Event::Start(BytesStart::new(ITEMS_TAG)))?;
    for item in items.items() {
        let position = item.vertical_position.to_string();
        let mut start = BytesStart::new(ITEM_TAG);
        start.push_attribute(("name", item.name.as_str()));
        start.push_attribute(("block", item.block_name.as_str()));
        start.push_attribute(("verticalPosition", position.as_str()));
        if let Some(error) = &item.error {
            start.push_attribute(("error", error.as_str()));
        }
        writer.write_event(Event::Start(start))?;
        match &item.value {
            Value::Scalar(text) => write_text_element(&mut writer, VALUE_TAG, text)?,
            Value::Matrix(rows) => {
                writer.write_event(Event::Start(BytesStart::new(MATRIX_TAG)))?;
                for row in rows {
                    writer.write_event(Event::Start(BytesStart::new(ROW_TAG)))?;
                    for cell in row {
                        write_text_element(&mut writer, CELL_TAG, cell)?;
                    }
                    writer.write_event(Event::End(BytesEnd::new(ROW_TAG)))?;
                }
                writer.write_event(Event::End(BytesEnd::new(MATRIX_TAG)))?;
            }
        }
        writer.write_event(Event::End(BytesEnd::new(ITEM_TAG)))?;
    }
    writer.write_event(Event::End(BytesEnd::new(ITEMS_TAG)))?;
    writer.write_event(Event::End(BytesEnd::new(ROOT_TAG)))?;
    String::from_utf8(writer.into_inner()).map_err(|e| CompartmentError::malformed(e.to_string()))
}

/// Record header read from the `ValueItem` attributes.
struct PendingItem {
    name: String,
    block_name: String,
    vertical_position: u32,
    error: Option<String>,
    value: Option<Value>,
}

impl PendingItem {
    fn from_start(start: &BytesStart) -> Result<Self> {
        let mut name = None;
        let mut block_name = None;
        let mut vertical_position = None;
        let mut error = None;
        for attribute in start.attributes() {
            let attribute = attribute?;
            let value = attribute.unescape_value()?.into_owned();
            match attribute.key.as_ref() {
                b"name" => name = Some(value),
                b"block" => block_name = Some(value),
                b"verticalPosition" => {
                    vertical_position = Some(value.trim().parse().map_err(|_| {
                        CompartmentError::malformed(format!("bad vertical position {value:?}"))
                    })?)
                }
                b"error" => error = Some(value),
                _ => {}
            }
        }
        let name = name.ok_or_else(|| CompartmentError::malformed("value item without name"))?;
        Ok(Self {
            block_name: block_name
                .ok_or_else(|| CompartmentError::malformed(format!("value item {name} without block")))?,
            vertical_position: vertical_position.unwrap_or(0),
            name,
            error,
            value: None,
        })
    }

    fn finish(self) -> Result<ValueItem> {
        let value = self
            .value
            .ok_or_else(|| CompartmentError::malformed(format!("value item {} without value", self.name)))?;
        Ok(ValueItem {
            name: self.name,
            block_name: self.block_name,
            vertical_position: self.vertical_position,
            value,
            error: self.error,
        })
    }
}

fn pending(current: &mut Option<PendingItem>) -> Result<&mut PendingItem> {
    current
        .as_mut()
        .ok_or_else(|| CompartmentError::malformed("value outside of a value item"))
}

/// Reads versioned XML written by [`write_value_items_xml`].
pub fn read_value_items_xml(xml: &str) -> Result<ValueItemContainer> {
    profile_scope!("read_value_items_xml");
    let mut reader = Reader::from_str(xml);
    let mut items = ValueItemContainer::new();
    let mut version: Option<String> = None;
    let mut seen_root = false;
    let mut current: Option<PendingItem> = None;
    let mut rows: Vec<Vec<String>> = Vec::new();
    // text collected inside Version, Value or Cell
    let mut text: Option<String> = None;

    loop {
        match reader.read_event()? {
            Event::Start(e) => {
                if !seen_root {
                    if e.name().as_ref() != ROOT_TAG.as_bytes() {
                        return Err(CompartmentError::malformed("root element is not a compartment container"));
                    }
                    seen_root = true;
                    continue;
                }
                match e.name().as_ref() {
                    b"ValueItem" => current = Some(PendingItem::from_start(&e)?),
                    b"Matrix" => rows.clear(),
                    b"Row" => rows.push(Vec::new()),
                    b"Version" | b"Value" | b"Cell" => text = Some(String::new()),
                    _ => {}
                }
            }
            Event::Empty(e) => match e.name().as_ref() {
                b"Value" => pending(&mut current)?.value = Some(Value::Scalar(String::new())),
                b"Matrix" => pending(&mut current)?.value = Some(Value::Matrix(Vec::new())),
                b"Row" => rows.push(Vec::new()),
                b"Cell" => rows
                    .last_mut()
                    .ok_or_else(|| CompartmentError::malformed("cell outside of a row"))?
                    .push(String::new()),
                b"ValueItem" => {
                    return Err(CompartmentError::malformed("value item without value"));
                }
                _ => {}
            },
            Event::Text(t) => {
                if let Some(buffer) = text.as_mut() {
                    buffer.push_str(&t.unescape()?);
                }
            }
            Event::CData(c) => {
                if let Some(buffer) = text.as_mut() {
                    buffer.push_str(&String::from_utf8_lossy(&c.into_inner()));
                }
            }
            Event::End(e) => match e.name().as_ref() {
                b"Version" => version = text.take(),
                b"Value" => {
                    let value = text.take().unwrap_or_default();
                    pending(&mut current)?.value = Some(Value::Scalar(value));
                }
                b"Cell" => {
                    let value = text.take().unwrap_or_default();
                    rows.last_mut()
                        .ok_or_else(|| CompartmentError::malformed("cell outside of a row"))?
                        .push(value);
                }
                b"Matrix" => pending(&mut current)?.value = Some(Value::Matrix(std::mem::take(&mut rows))),
                b"ValueItem" => {
                    let item = current
                        .take()
                        .ok_or_else(|| CompartmentError::malformed("unbalanced value item"))?;
                    items.insert(item.finish()?);
                }
                _ => {}
            },
            Event::Eof => break,
            _ => {}
        }
    }

    match version {
        Some(v) if v.trim() == config::XML_VERSION => Ok(items),
        Some(v) => Err(CompartmentError::UnsupportedVersion(v.trim().to_string())),
        None if !seen_root => Err(CompartmentError::malformed("empty document")),
        None => Err(CompartmentError::malformed("missing version")),
    }
}

/// Saves a container. Writes to a temporary file first so an interrupted
/// save never truncates an existing file.
pub fn save_container<P: AsRef<Path>>(
    path: P,
    container: &CompartmentContainer,
    format: SaveFormat,
    compress: bool,
) -> Result<()> {
    profile_scope!("save_container");
    let path = path.as_ref();
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        std::fs::create_dir_all(parent)?;
    }
    let items = container.to_value_items();
    let tmp_path = path.with_extension({
        let mut os = path.extension().map(|e| e.to_os_string()).unwrap_or_default();
        os.push(".tmp");
        os
    });
    let written = write_snapshot(&tmp_path, &items, format, compress)
        .and_then(|()| std::fs::rename(&tmp_path, path).map_err(CompartmentError::from));
    if let Err(e) = written {
        // never leave a half-written snapshot next to the target
        if let Err(cleanup) = std::fs::remove_file(&tmp_path) {
            log::debug!("could not remove {}: {cleanup}", tmp_path.display());
        }
        return Err(e);
    }
    log::info!("saved compartment container to {}", path.display());
    Ok(())
}

fn write_snapshot(path: &Path, items: &ValueItemContainer, format: SaveFormat, compress: bool) -> Result<()> {
    let writer = BufWriter::new(std::fs::File::create(path)?);
    if compress {
        let mut encoder = GzEncoder::new(writer, Compression::fast());
        write_items(&mut encoder, items, format)?;
        encoder.finish()?.flush()?;
    } else {
        let mut writer = writer;
        write_items(&mut writer, items, format)?;
        writer.flush()?;
    }
    Ok(())
}

fn write_items<W: Write>(writer: &mut W, items: &ValueItemContainer, format: SaveFormat) -> Result<()> {
    match format {
        SaveFormat::Xml => writer.write_all(write_value_items_xml(items)?.as_bytes())?,
        SaveFormat::Json => serde_json::to_writer_pretty(writer, items)?,
        SaveFormat::Binary => bincode::serialize_into(writer, items)?,
    }
    Ok(())
}

/// Loads a container saved by [`save_container`] in any format, compressed
/// or not.
pub fn load_container<P: AsRef<Path>>(path: P, config: CompartmentConfig) -> Result<CompartmentContainer> {
    profile_scope!("load_container");
    let data = std::fs::read(path.as_ref())?;
    let items = match maybe_decompress_gzip(&data)? {
        Some(decoded) => parse_items_bytes(&decoded)?,
        None => parse_items_bytes(&data)?,
    };
    CompartmentContainer::from_value_items(&items, config)
}

fn parse_items_bytes(bytes: &[u8]) -> Result<ValueItemContainer> {
    match bytes.iter().find(|b| !b.is_ascii_whitespace()) {
        Some(b'<') => {
            let xml = std::str::from_utf8(bytes).map_err(|e| CompartmentError::malformed(e.to_string()))?;
            read_value_items_xml(xml)
        }
        Some(b'{') => Ok(serde_json::from_slice(bytes)?),
        _ => Ok(bincode::deserialize(bytes)?),
    }
}

fn maybe_decompress_gzip(data: &[u8]) -> Result<Option<Vec<u8>>> {
    if data.len() < 2 || data[0] != 0x1f || data[1] != 0x8b {
        return Ok(None);
    }

    let mut decoder = GzDecoder::new(Cursor::new(data));
    let mut decoded = Vec::new();
    decoder.read_to_end(&mut decoded)?;
    Ok(Some(decoded))
}
