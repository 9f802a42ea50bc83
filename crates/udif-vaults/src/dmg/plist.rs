//! Metadata property list: the `resource-fork` / `blkx` array
//!
//! The XML is parsed once into an owned list of entries; every later query
//! (partition enumeration, block table lookup by ID) runs over that list.
//!
//! ```text
//! <plist><dict>
//!   <key>resource-fork</key>
//!   <dict>
//!     <key>blkx</key>
//!     <array>
//!       <dict>
//!         <key>CFName</key><string>Apple (Apple_partition_map : 1)</string>
//!         <key>Data</key><data>bWlzaAAAAAEAAAAAAAAAAQ...</data>
//!         <key>ID</key><string>0</string>
//!         <key>Name</key><string>Apple (Apple_partition_map : 1)</string>
//!       </dict>
//!     </array>
//!   </dict>
//! </dict></plist>
//! ```

use roxmltree::{Document, Node, ParsingOptions};
use udif_core::{Error, Result};

/// One dictionary of the `blkx` array
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct BlkxEntry {
    /// Value of the `ID` key, if it holds an integer
    pub id: Option<i64>,
    pub name: Option<String>,
    pub cf_name: Option<String>,
    /// Base64 text of the `Data` key
    pub data: Option<String>,
}

impl BlkxEntry {
    /// The descriptor string: `CFName` when present and non-empty, else `Name`
    pub fn display_name(&self) -> Option<&str> {
        self.cf_name
            .as_deref()
            .filter(|name| !name.is_empty())
            .or(self.name.as_deref())
    }
}

/// Owned view of the metadata property list
#[derive(Debug, Clone, Default)]
pub struct MetadataDocument {
    entries: Vec<BlkxEntry>,
}

fn element_text(node: Node<'_, '_>) -> String {
    node.descendants()
        .filter(|n| n.is_text())
        .filter_map(|n| n.text())
        .collect()
}

/// Value of `<key>name</key>` in a dict: the first following sibling element
/// with the wanted tag
fn dict_value<'a, 'input>(dict: Node<'a, 'input>, key: &str, tag: &str) -> Option<Node<'a, 'input>> {
    let key_node = dict
        .children()
        .find(|n| n.has_tag_name("key") && element_text(*n).trim() == key)?;

    key_node
        .next_siblings()
        .skip(1)
        .find(|n| n.is_element() && n.has_tag_name(tag))
}

impl MetadataDocument {
    /// Parse the raw metadata blob
    ///
    /// A document without a `resource-fork` / `blkx` array is valid and has no
    /// entries.
    ///
    /// # Errors
    ///
    /// Returns `InvalidVault` if the blob is not well-formed XML
    pub fn parse(blob: &[u8]) -> Result<Self> {
        let text = String::from_utf8_lossy(blob);
        let options = ParsingOptions {
            allow_dtd: true,
            ..ParsingOptions::default()
        };

        let document = Document::parse_with_options(&text, options)
            .map_err(|e| Error::invalid_vault(format!("Cannot parse metadata XML: {}", e)))?;

        let blkx_array = document
            .root_element()
            .children()
            .find(|n| n.has_tag_name("dict"))
            .and_then(|top| dict_value(top, "resource-fork", "dict"))
            .and_then(|fork| dict_value(fork, "blkx", "array"));

        let entries = match blkx_array {
            Some(array) => array
                .children()
                .filter(|n| n.has_tag_name("dict"))
                .map(|dict| BlkxEntry {
                    id: dict_value(dict, "ID", "string")
                        .and_then(|n| element_text(n).trim().parse().ok()),
                    name: dict_value(dict, "Name", "string").map(element_text),
                    cf_name: dict_value(dict, "CFName", "string").map(element_text),
                    data: dict_value(dict, "Data", "data").map(element_text),
                })
                .collect(),
            None => {
                tracing::debug!("Metadata has no resource-fork/blkx array");
                Vec::new()
            }
        };

        Ok(Self { entries })
    }

    /// Build a document from already extracted entries
    pub fn from_entries(entries: Vec<BlkxEntry>) -> Self {
        Self { entries }
    }

    /// All entries in document order
    pub fn entries(&self) -> &[BlkxEntry] {
        &self.entries
    }

    /// Entries describing partitions (non-negative ID), in document order
    pub fn partition_entries(&self) -> impl Iterator<Item = &BlkxEntry> {
        self.entries
            .iter()
            .filter(|entry| matches!(entry.id, Some(id) if id >= 0))
    }

    /// Base64 block table text of the first entry whose ID equals `index`
    ///
    /// Returns `None` when there is no such entry or its Data is empty.
    pub fn block_data(&self, index: i64) -> Option<&str> {
        self.entries
            .iter()
            .find(|entry| entry.id == Some(index))
            .and_then(|entry| entry.data.as_deref())
            .filter(|data| !data.trim().is_empty())
    }

    /// Largest ID present, if any entry has one
    pub fn highest_id(&self) -> Option<i64> {
        self.entries.iter().filter_map(|entry| entry.id).max()
    }
}

/// Split a descriptor like `"Apple (Apple_partition_map : 1)"` into name and type
///
/// The name is everything before the first `(` without its trailing space; the
/// type runs from that `(` to the next `:`, minus one trailing space. The ID
/// after the colon is ignored. Returns `None` if either delimiter is missing.
pub fn parse_name_and_type(descriptor: &str) -> Option<(String, String)> {
    let paren = descriptor.find('(')?;
    let colon = paren + descriptor[paren..].find(':')?;

    let name = &descriptor[..paren];
    let name = name.strip_suffix(' ').unwrap_or(name);

    let kind = &descriptor[paren + 1..colon];
    let kind = kind.strip_suffix(' ').unwrap_or(kind);

    Some((name.to_string(), kind.to_string()))
}
