//! Synthetic UDIF containers for tests
//!
//! Layout of a built image: run data, then the XML plist, then the koly trailer.

use super::types::BlkxTable;
use ::base64::prelude::BASE64_STANDARD;
use ::base64::Engine as _;
use flate2::write::ZlibEncoder;
use flate2::Compression;
use std::io::Write;

/// Sector data of one run
pub(crate) enum Payload {
    Raw(Vec<u8>),
    Zlib(Vec<u8>),
    /// Number of zero-filled sectors
    Zero(u64),
}

struct FixtureEntry {
    id: i64,
    cf_name: Option<String>,
    name: Option<String>,
    first_sector: u64,
    payloads: Vec<Payload>,
    tableless: bool,
}

#[derive(Default)]
pub(crate) struct DmgBuilder {
    entries: Vec<FixtureEntry>,
    plist: Option<Vec<u8>>,
}

impl DmgBuilder {
    pub(crate) fn new() -> Self {
        Self::default()
    }

    fn push(
        mut self,
        id: i64,
        cf_name: Option<&str>,
        name: Option<&str>,
        first_sector: u64,
        payloads: Vec<Payload>,
    ) -> Self {
        self.entries.push(FixtureEntry {
            id,
            cf_name: cf_name.map(str::to_string),
            name: name.map(str::to_string),
            first_sector,
            payloads,
            tableless: false,
        });
        self
    }

    /// Entry carrying both `CFName` and `Name`
    pub(crate) fn partition(self, id: i64, descriptor: &str, first_sector: u64, payloads: Vec<Payload>) -> Self {
        self.push(id, Some(descriptor), Some(descriptor), first_sector, payloads)
    }

    /// Entry carrying only the `Name` key
    pub(crate) fn name_only(self, id: i64, descriptor: &str, first_sector: u64, payloads: Vec<Payload>) -> Self {
        self.push(id, None, Some(descriptor), first_sector, payloads)
    }

    /// Entry with neither `CFName` nor `Name`
    pub(crate) fn unnamed(self, id: i64, first_sector: u64, payloads: Vec<Payload>) -> Self {
        self.push(id, None, None, first_sector, payloads)
    }

    /// Named entry whose `Data` field is empty
    pub(crate) fn tableless(mut self, id: i64, descriptor: &str) -> Self {
        self.entries.push(FixtureEntry {
            id,
            cf_name: Some(descriptor.to_string()),
            name: Some(descriptor.to_string()),
            first_sector: 0,
            payloads: Vec::new(),
            tableless: true,
        });
        self
    }

    /// Replace the generated plist with arbitrary bytes
    pub(crate) fn raw_plist(mut self, plist: &[u8]) -> Self {
        self.plist = Some(plist.to_vec());
        self
    }

    pub(crate) fn build(&self) -> Vec<u8> {
        let mut image = Vec::new();
        let mut tables = Vec::new();
        let mut last_sector = 0;

        for entry in &self.entries {
            if entry.tableless {
                tables.push(Vec::new());
                continue;
            }

            let data_offset = image.len() as u64;
            let mut runs = Vec::new();
            let mut sector = 0u64;

            for payload in &entry.payloads {
                let offset = image.len() as u64 - data_offset;
                match payload {
                    Payload::Raw(bytes) => {
                        let count = sectors(bytes);
                        runs.push((0x0000_0001, sector, count, offset, bytes.len() as u64));
                        image.extend_from_slice(bytes);
                        sector += count;
                    }
                    Payload::Zlib(bytes) => {
                        let count = sectors(bytes);
                        let packed = zlib(bytes);
                        runs.push((0x8000_0005, sector, count, offset, packed.len() as u64));
                        image.extend_from_slice(&packed);
                        sector += count;
                    }
                    Payload::Zero(count) => {
                        runs.push((0x0000_0000, sector, *count, offset, 0));
                        sector += count;
                    }
                }
            }

            let offset = image.len() as u64 - data_offset;
            runs.push((0xFFFF_FFFF, sector, 0, offset, 0));

            last_sector = last_sector.max(entry.first_sector + sector);
            tables.push(mish(entry.first_sector, sector, data_offset, &runs));
        }

        let data_fork_length = image.len() as u64;
        let plist = match &self.plist {
            Some(plist) => plist.clone(),
            None => self.render_plist(&tables).into_bytes(),
        };

        let plist_offset = image.len() as u64;
        image.extend_from_slice(&plist);
        image.extend_from_slice(&koly(data_fork_length, plist_offset, plist.len() as u64, last_sector));
        image
    }

    fn render_plist(&self, tables: &[Vec<u8>]) -> String {
        let mut xml = String::from(concat!(
            "<?xml version=\"1.0\" encoding=\"UTF-8\"?>\n",
            "<!DOCTYPE plist PUBLIC \"-//Apple//DTD PLIST 1.0//EN\" ",
            "\"http://www.apple.com/DTDs/PropertyList-1.0.dtd\">\n",
            "<plist version=\"1.0\">\n<dict>\n",
            "\t<key>resource-fork</key>\n\t<dict>\n\t\t<key>blkx</key>\n\t\t<array>\n",
        ));

        for (entry, table) in self.entries.iter().zip(tables) {
            xml.push_str("\t\t\t<dict>\n\t\t\t\t<key>Attributes</key>\n\t\t\t\t<string>0x0050</string>\n");
            if let Some(cf_name) = &entry.cf_name {
                xml.push_str(&format!("\t\t\t\t<key>CFName</key>\n\t\t\t\t<string>{}</string>\n", escape(cf_name)));
            }

            xml.push_str("\t\t\t\t<key>Data</key>\n\t\t\t\t<data>\n");
            for line in BASE64_STANDARD.encode(table).as_bytes().chunks(52) {
                xml.push_str("\t\t\t\t");
                xml.push_str(&String::from_utf8_lossy(line));
                xml.push('\n');
            }
            xml.push_str("\t\t\t\t</data>\n");

            xml.push_str(&format!("\t\t\t\t<key>ID</key>\n\t\t\t\t<string>{}</string>\n", entry.id));
            if let Some(name) = &entry.name {
                xml.push_str(&format!("\t\t\t\t<key>Name</key>\n\t\t\t\t<string>{}</string>\n", escape(name)));
            }
            xml.push_str("\t\t\t</dict>\n");
        }

        xml.push_str("\t\t</array>\n\t</dict>\n</dict>\n</plist>\n");
        xml
    }
}

fn sectors(bytes: &[u8]) -> u64 {
    assert_eq!(bytes.len() % 512, 0, "payloads must be whole sectors");
    bytes.len() as u64 / 512
}

fn escape(text: &str) -> String {
    text.replace('&', "&amp;").replace('<', "&lt;").replace('>', "&gt;")
}

pub(crate) fn zlib(data: &[u8]) -> Vec<u8> {
    let mut encoder = ZlibEncoder::new(Vec::new(), Compression::default());
    encoder.write_all(data).unwrap();
    encoder.finish().unwrap()
}

/// Encode a block table; runs are (type, sector, count, offset, length)
pub(crate) fn mish(first_sector: u64, sector_count: u64, data_offset: u64, runs: &[(u32, u64, u64, u64, u64)]) -> Vec<u8> {
    let mut table = vec![0u8; BlkxTable::HEADER_SIZE];
    table[0..4].copy_from_slice(BlkxTable::MAGIC);
    table[4..8].copy_from_slice(&1u32.to_be_bytes());
    table[8..16].copy_from_slice(&first_sector.to_be_bytes());
    table[16..24].copy_from_slice(&sector_count.to_be_bytes());
    table[24..32].copy_from_slice(&data_offset.to_be_bytes());
    table[36..40].copy_from_slice(&2u32.to_be_bytes());
    table[200..204].copy_from_slice(&(runs.len() as u32).to_be_bytes());

    for &(kind, sector, count, offset, length) in runs {
        table.extend_from_slice(&kind.to_be_bytes());
        table.extend_from_slice(&0u32.to_be_bytes());
        table.extend_from_slice(&sector.to_be_bytes());
        table.extend_from_slice(&count.to_be_bytes());
        table.extend_from_slice(&offset.to_be_bytes());
        table.extend_from_slice(&length.to_be_bytes());
    }

    table
}

/// Encode a koly trailer
pub(crate) fn koly(data_fork_length: u64, plist_offset: u64, plist_length: u64, sector_count: u64) -> Vec<u8> {
    let mut trailer = vec![0u8; 512];
    trailer[0..4].copy_from_slice(b"koly");
    trailer[4..8].copy_from_slice(&4u32.to_be_bytes());
    trailer[8..12].copy_from_slice(&512u32.to_be_bytes());
    trailer[12..16].copy_from_slice(&1u32.to_be_bytes());
    trailer[32..40].copy_from_slice(&data_fork_length.to_be_bytes());
    trailer[56..60].copy_from_slice(&1u32.to_be_bytes());
    trailer[60..64].copy_from_slice(&1u32.to_be_bytes());
    trailer[216..224].copy_from_slice(&plist_offset.to_be_bytes());
    trailer[224..232].copy_from_slice(&plist_length.to_be_bytes());
    trailer[488..492].copy_from_slice(&1u32.to_be_bytes());
    trailer[492..500].copy_from_slice(&sector_count.to_be_bytes());
    trailer
}

/// Block 0 of an Apple Partition Map disk
pub(crate) fn ddm_block(block_size: u16) -> Vec<u8> {
    let mut block = vec![0u8; 512];
    block[0..2].copy_from_slice(b"ER");
    block[2..4].copy_from_slice(&block_size.to_be_bytes());
    block
}

/// Apple partition map entries from (name, type, start_block, block_count)
pub(crate) fn apm_entries(entries: &[(&str, &str, u32, u32)]) -> Vec<u8> {
    let mut bytes = Vec::new();
    for (name, kind, start, count) in entries {
        let mut block = vec![0u8; 512];
        block[0..2].copy_from_slice(b"PM");
        block[4..8].copy_from_slice(&(entries.len() as u32).to_be_bytes());
        block[8..12].copy_from_slice(&start.to_be_bytes());
        block[12..16].copy_from_slice(&count.to_be_bytes());
        block[16..16 + name.len()].copy_from_slice(name.as_bytes());
        block[48..48 + kind.len()].copy_from_slice(kind.as_bytes());
        bytes.extend_from_slice(&block);
    }
    bytes
}

/// A protective MBR with a single 0xEE partition
pub(crate) fn protective_mbr() -> Vec<u8> {
    let mut mbr = vec![0u8; 512];
    mbr[0x1BE + 4] = 0xEE;
    mbr[0x1BE + 8..0x1BE + 12].copy_from_slice(&1u32.to_le_bytes());
    mbr[0x1BE + 12..0x1BE + 16].copy_from_slice(&0xFFFF_FFFFu32.to_le_bytes());
    mbr[0x1FE] = 0x55;
    mbr[0x1FF] = 0xAA;
    mbr
}

/// A 128-entry GPT array from (type guid bytes, first_lba, last_lba)
pub(crate) fn gpt_entries(entries: &[([u8; 16], u64, u64)]) -> Vec<u8> {
    let mut bytes = vec![0u8; 128 * 128];
    for (i, (kind, first, last)) in entries.iter().enumerate() {
        let at = i * 128;
        bytes[at..at + 16].copy_from_slice(kind);
        bytes[at + 32..at + 40].copy_from_slice(&first.to_le_bytes());
        bytes[at + 40..at + 48].copy_from_slice(&last.to_le_bytes());
    }
    bytes
}
