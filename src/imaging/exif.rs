//! EXIF metadata block: build from inspection data, serialize to TIFF,
//! parse back, and splice into image containers.
//!
//! The block carries four groups, laid out as TIFF IFDs:
//!
//! | Group | IFD | Tags written |
//! |---|---|---|
//! | Image | IFD0 | DateTime (`0x0132`); Orientation (`0x0112`) is read and preserved |
//! | Photo | Exif IFD (`0x8769`) | DateTimeOriginal (`0x9003`), UserComment (`0x9286`) |
//! | GPS | GPS IFD (`0x8825`) | version, lat/lon + refs, altitude, time/date stamp, DOP, speed, heading |
//! | Interop | Interop IFD (`0xA005`) | none (empty group) |
//!
//! Output is always big-endian (`MM`). The reader accepts both byte orders,
//! since camera firmware overwhelmingly writes `II`.
//!
//! Container handling (finding and replacing the APP1/eXIf/EXIF chunk) is
//! delegated to `img-parts`; only the TIFF payload is built here.

use super::calculations::{fixed_point, from_dms, rational_value, to_dms};
use crate::types::{GeoFix, InspectionMetadata};
use chrono::{DateTime, NaiveDateTime, Timelike};
use img_parts::{Bytes, DynImage, ImageEXIF};
use thiserror::Error;
use tracing::debug;

#[derive(Error, Debug)]
pub enum CodecError {
    #[error("unsupported image container (expected JPEG, PNG or WebP)")]
    UnsupportedContainer,
    #[error("unreadable image container: {0}")]
    Container(String),
    #[error("malformed EXIF data: {0}")]
    Malformed(String),
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("metadata serialization failed: {0}")]
    Json(#[from] serde_json::Error),
}

/// An unsigned TIFF rational `(numerator, denominator)`.
pub type Rational = (u32, u32);

/// `strftime` layout of EXIF date-time strings.
pub const EXIF_DATETIME_FORMAT: &str = "%Y:%m:%d %H:%M:%S";

pub const TAG_ORIENTATION: u16 = 0x0112;
pub const TAG_DATE_TIME: u16 = 0x0132;
pub const TAG_EXIF_IFD: u16 = 0x8769;
pub const TAG_GPS_IFD: u16 = 0x8825;
pub const TAG_DATE_TIME_ORIGINAL: u16 = 0x9003;
pub const TAG_USER_COMMENT: u16 = 0x9286;
pub const TAG_INTEROP_IFD: u16 = 0xA005;

pub const GPS_VERSION_ID: u16 = 0x0000;
pub const GPS_LATITUDE_REF: u16 = 0x0001;
pub const GPS_LATITUDE: u16 = 0x0002;
pub const GPS_LONGITUDE_REF: u16 = 0x0003;
pub const GPS_LONGITUDE: u16 = 0x0004;
pub const GPS_ALTITUDE_REF: u16 = 0x0005;
pub const GPS_ALTITUDE: u16 = 0x0006;
pub const GPS_TIME_STAMP: u16 = 0x0007;
pub const GPS_DOP: u16 = 0x000B;
pub const GPS_SPEED_REF: u16 = 0x000C;
pub const GPS_SPEED: u16 = 0x000D;
pub const GPS_IMG_DIRECTION_REF: u16 = 0x0010;
pub const GPS_IMG_DIRECTION: u16 = 0x0011;
pub const GPS_DATE_STAMP: u16 = 0x001D;

const ASCII_CODE: &[u8; 8] = b"ASCII\0\0\0";
const UNICODE_CODE: &[u8; 8] = b"UNICODE\0";
const UNDEFINED_CODE: &[u8; 8] = &[0; 8];

// ---------------------------------------------------------------------------
// Block model
// ---------------------------------------------------------------------------

/// A complete metadata block as embedded in one image.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct MetadataBlock {
    pub image: ImageGroup,
    pub photo: PhotoGroup,
    pub gps: Option<GpsGroup>,
    pub interop: Option<InteropGroup>,
}

/// IFD0 fields.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ImageGroup {
    pub date_time: Option<String>,
    pub orientation: Option<u16>,
}

/// Exif sub-IFD fields. `user_comment` holds the raw bytes including the
/// 8-byte character-code prefix.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct PhotoGroup {
    pub date_time_original: Option<String>,
    pub user_comment: Option<Vec<u8>>,
}

/// Interoperability IFD. Written empty.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct InteropGroup;

/// One GPS axis: hemisphere reference plus degrees/minutes/seconds.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct GpsCoordinate {
    pub reference: u8,
    pub dms: [Rational; 3],
}

impl GpsCoordinate {
    fn from_decimal(value: f64, positive: u8, negative: u8) -> Self {
        let dms = to_dms(value);
        Self {
            reference: if value < 0.0 { negative } else { positive },
            dms: [
                (dms.degrees, 1),
                (dms.minutes, 1),
                fixed_point(dms.seconds, 1_000_000),
            ],
        }
    }

    /// Signed decimal degrees; southern and western references are negative.
    pub fn to_decimal(&self) -> Option<f64> {
        let magnitude = from_dms(
            rational_value(self.dms[0])?,
            rational_value(self.dms[1])?,
            rational_value(self.dms[2])?,
        );
        Some(match self.reference {
            b'S' | b'W' => -magnitude,
            _ => magnitude,
        })
    }

    pub fn reference_char(&self) -> char {
        self.reference as char
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct GpsAltitude {
    pub below_sea_level: bool,
    pub meters: Rational,
}

/// GPS sub-IFD fields.
#[derive(Debug, Clone, PartialEq)]
pub struct GpsGroup {
    pub version: [u8; 4],
    pub latitude: GpsCoordinate,
    pub longitude: GpsCoordinate,
    pub altitude: Option<GpsAltitude>,
    pub time_stamp: Option<[Rational; 3]>,
    /// Horizontal accuracy in meters, stored in the DOP field.
    pub dop: Option<Rational>,
    pub speed_kmh: Option<Rational>,
    pub img_direction: Option<Rational>,
    pub date_stamp: Option<String>,
}

impl GpsGroup {
    /// Encode a fix. GPS date and time stamps are the fix's sample time in UTC.
    pub fn from_fix(fix: &GeoFix) -> Self {
        let sampled = DateTime::from_timestamp_millis(fix.sampled_at_epoch_ms);
        Self {
            version: [2, 3, 0, 0],
            latitude: GpsCoordinate::from_decimal(fix.latitude, b'N', b'S'),
            longitude: GpsCoordinate::from_decimal(fix.longitude, b'E', b'W'),
            altitude: fix.altitude_meters.map(|alt| GpsAltitude {
                below_sea_level: alt < 0.0,
                meters: fixed_point(alt, 1_000_000),
            }),
            time_stamp: sampled.map(|t| [(t.hour(), 1), (t.minute(), 1), (t.second(), 1)]),
            dop: Some(fixed_point(fix.accuracy_meters, 100)),
            speed_kmh: fix.speed_mps.map(|s| fixed_point(s * 3.6, 1_000_000)),
            img_direction: fix.heading_degrees.map(|h| fixed_point(h, 100)),
            date_stamp: sampled.map(|t| t.format("%Y:%m:%d").to_string()),
        }
    }

    pub fn latitude_degrees(&self) -> Option<f64> {
        self.latitude.to_decimal()
    }

    pub fn longitude_degrees(&self) -> Option<f64> {
        self.longitude.to_decimal()
    }

    pub fn accuracy_meters(&self) -> Option<f64> {
        self.dop.and_then(rational_value)
    }

    /// Signed altitude; negative below sea level.
    pub fn altitude_meters(&self) -> Option<f64> {
        let alt = self.altitude?;
        let meters = rational_value(alt.meters)?;
        Some(if alt.below_sea_level { -meters } else { meters })
    }
}

impl MetadataBlock {
    pub fn is_empty(&self) -> bool {
        *self == MetadataBlock::default()
    }

    /// Decoded user comment text, without the character-code prefix.
    pub fn comment_text(&self) -> Option<String> {
        self.photo
            .user_comment
            .as_deref()
            .and_then(decode_user_comment)
    }

    /// The inspection record stored as JSON in the user comment, if any.
    pub fn inspection(&self) -> Option<InspectionMetadata> {
        serde_json::from_str(&self.comment_text()?).ok()
    }

    /// DateTimeOriginal parsed as a local wall-clock time.
    pub fn captured_at(&self) -> Option<NaiveDateTime> {
        let raw = self.photo.date_time_original.as_deref()?;
        NaiveDateTime::parse_from_str(raw, EXIF_DATETIME_FORMAT).ok()
    }
}

// ---------------------------------------------------------------------------
// Codec entry points
// ---------------------------------------------------------------------------

/// Build the metadata block for a save action.
///
/// The comment is written only when the record carries form fields, and the
/// GPS group only when it carries a location.
pub fn encode(
    metadata: &InspectionMetadata,
    captured_at: NaiveDateTime,
) -> Result<MetadataBlock, CodecError> {
    let stamp = captured_at.format(EXIF_DATETIME_FORMAT).to_string();
    let user_comment = if metadata.has_form_fields() {
        Some(encode_user_comment(&serde_json::to_string(metadata)?))
    } else {
        None
    };

    Ok(MetadataBlock {
        image: ImageGroup {
            date_time: Some(stamp.clone()),
            orientation: None,
        },
        photo: PhotoGroup {
            date_time_original: Some(stamp),
            user_comment,
        },
        gps: metadata.location.as_ref().map(GpsGroup::from_fix),
        interop: Some(InteropGroup),
    })
}

/// Read the metadata block embedded in an image.
///
/// Images without an EXIF chunk yield an empty block.
pub fn decode(image: &[u8]) -> Result<MetadataBlock, CodecError> {
    let container = parse_container(image)?;
    match container.exif() {
        Some(tiff) => MetadataBlock::from_tiff(&tiff),
        None => Ok(MetadataBlock::default()),
    }
}

/// Replace the image's metadata block with `block`. Nothing is merged.
pub fn embed(image: &[u8], block: &MetadataBlock) -> Result<Vec<u8>, CodecError> {
    let mut container = parse_container(image)?;
    container.set_exif(Some(Bytes::from(block.to_tiff())));
    let mut out = Vec::with_capacity(image.len() + 512);
    container.encoder().write_to(&mut out)?;
    Ok(out)
}

fn parse_container(image: &[u8]) -> Result<DynImage, CodecError> {
    DynImage::from_bytes(Bytes::copy_from_slice(image))
        .map_err(|e| CodecError::Container(e.to_string()))?
        .ok_or(CodecError::UnsupportedContainer)
}

/// Prefix `text` with the EXIF character code: ASCII when possible,
/// otherwise the undefined code followed by UTF-8.
pub fn encode_user_comment(text: &str) -> Vec<u8> {
    let code = if text.is_ascii() { ASCII_CODE } else { UNDEFINED_CODE };
    let mut out = Vec::with_capacity(8 + text.len());
    out.extend_from_slice(code);
    out.extend_from_slice(text.as_bytes());
    out
}

/// Strip the character-code prefix and decode the payload.
pub fn decode_user_comment(raw: &[u8]) -> Option<String> {
    if raw.len() < 8 {
        return None;
    }
    let (code, payload) = raw.split_at(8);
    let text = if code == UNICODE_CODE {
        decode_utf16(payload)
    } else {
        String::from_utf8_lossy(payload).into_owned()
    };
    let text = text.trim_end_matches(['\0', ' ']).to_string();
    (!text.is_empty()).then_some(text)
}

fn decode_utf16(payload: &[u8]) -> String {
    let little = payload.starts_with(&[0xFF, 0xFE]);
    let units: Vec<u16> = payload
        .chunks_exact(2)
        .map(|c| {
            if little {
                u16::from_le_bytes([c[0], c[1]])
            } else {
                u16::from_be_bytes([c[0], c[1]])
            }
        })
        .filter(|&u| u != 0xFEFF)
        .collect();
    String::from_utf16_lossy(&units)
}

// ---------------------------------------------------------------------------
// TIFF writer
// ---------------------------------------------------------------------------

#[derive(Debug, Clone)]
enum Value {
    Byte(Vec<u8>),
    Ascii(String),
    Short(Vec<u16>),
    Long(Vec<u32>),
    Rational(Vec<Rational>),
    Undefined(Vec<u8>),
}

impl Value {
    fn type_code(&self) -> u16 {
        match self {
            Value::Byte(_) => 1,
            Value::Ascii(_) => 2,
            Value::Short(_) => 3,
            Value::Long(_) => 4,
            Value::Rational(_) => 5,
            Value::Undefined(_) => 7,
        }
    }

    fn count(&self) -> u32 {
        let n = match self {
            Value::Byte(v) | Value::Undefined(v) => v.len(),
            Value::Ascii(s) => s.len() + 1,
            Value::Short(v) => v.len(),
            Value::Long(v) => v.len(),
            Value::Rational(v) => v.len(),
        };
        n as u32
    }

    fn to_be_bytes(&self) -> Vec<u8> {
        match self {
            Value::Byte(v) | Value::Undefined(v) => v.clone(),
            Value::Ascii(s) => {
                let mut b = s.as_bytes().to_vec();
                b.push(0);
                b
            }
            Value::Short(v) => v.iter().flat_map(|x| x.to_be_bytes()).collect(),
            Value::Long(v) => v.iter().flat_map(|x| x.to_be_bytes()).collect(),
            Value::Rational(v) => v
                .iter()
                .flat_map(|(n, d)| n.to_be_bytes().into_iter().chain(d.to_be_bytes()))
                .collect(),
        }
    }
}

struct Entry {
    tag: u16,
    value: Value,
}

impl Entry {
    fn new(tag: u16, value: Value) -> Self {
        Self { tag, value }
    }
}

/// Serialized size of an IFD: count, entries, next-IFD link, out-of-line data.
fn ifd_size(entries: &[Entry]) -> usize {
    let data: usize = entries
        .iter()
        .map(|e| e.value.to_be_bytes().len())
        .filter(|&len| len > 4)
        .map(|len| len + len % 2)
        .sum();
    2 + entries.len() * 12 + 4 + data
}

/// Append one IFD at `out.len()`, which must equal its absolute offset.
fn write_ifd(out: &mut Vec<u8>, entries: &[Entry]) {
    let start = out.len();
    let mut data_offset = start + 2 + entries.len() * 12 + 4;
    let mut data = Vec::new();

    out.extend_from_slice(&(entries.len() as u16).to_be_bytes());
    for entry in entries {
        let bytes = entry.value.to_be_bytes();
        out.extend_from_slice(&entry.tag.to_be_bytes());
        out.extend_from_slice(&entry.value.type_code().to_be_bytes());
        out.extend_from_slice(&entry.value.count().to_be_bytes());
        if bytes.len() <= 4 {
            let mut inline = [0u8; 4];
            inline[..bytes.len()].copy_from_slice(&bytes);
            out.extend_from_slice(&inline);
        } else {
            out.extend_from_slice(&(data_offset as u32).to_be_bytes());
            let padded = bytes.len() + bytes.len() % 2;
            data.extend_from_slice(&bytes);
            data.resize(data.len() + padded - bytes.len(), 0);
            data_offset += padded;
        }
    }
    // No linked IFD
    out.extend_from_slice(&0u32.to_be_bytes());
    out.extend_from_slice(&data);
}

fn set_pointer(entries: &mut [Entry], tag: u16, offset: usize) {
    if let Some(entry) = entries.iter_mut().find(|e| e.tag == tag) {
        entry.value = Value::Long(vec![offset as u32]);
    }
}

impl MetadataBlock {
    /// Serialize to a big-endian TIFF payload (no `Exif\0\0` prefix).
    pub fn to_tiff(&self) -> Vec<u8> {
        let mut ifd0 = Vec::new();
        if let Some(o) = self.image.orientation {
            ifd0.push(Entry::new(TAG_ORIENTATION, Value::Short(vec![o])));
        }
        if let Some(dt) = &self.image.date_time {
            ifd0.push(Entry::new(TAG_DATE_TIME, Value::Ascii(dt.clone())));
        }

        let mut exif = Vec::new();
        if let Some(dt) = &self.photo.date_time_original {
            exif.push(Entry::new(TAG_DATE_TIME_ORIGINAL, Value::Ascii(dt.clone())));
        }
        if let Some(comment) = &self.photo.user_comment {
            exif.push(Entry::new(TAG_USER_COMMENT, Value::Undefined(comment.clone())));
        }
        let interop: Vec<Entry> = Vec::new();
        if self.interop.is_some() {
            exif.push(Entry::new(TAG_INTEROP_IFD, Value::Long(vec![0])));
        }

        let gps = self.gps.as_ref().map(gps_entries);
        let has_exif = !exif.is_empty();
        if has_exif {
            ifd0.push(Entry::new(TAG_EXIF_IFD, Value::Long(vec![0])));
        }
        if gps.is_some() {
            ifd0.push(Entry::new(TAG_GPS_IFD, Value::Long(vec![0])));
        }

        // Pointer entries are fixed-size, so layout can be computed before
        // their values are known.
        let exif_offset = 8 + ifd_size(&ifd0);
        let interop_offset = exif_offset + if has_exif { ifd_size(&exif) } else { 0 };
        let gps_offset = interop_offset
            + if self.interop.is_some() {
                ifd_size(&interop)
            } else {
                0
            };
        set_pointer(&mut ifd0, TAG_EXIF_IFD, exif_offset);
        set_pointer(&mut ifd0, TAG_GPS_IFD, gps_offset);
        set_pointer(&mut exif, TAG_INTEROP_IFD, interop_offset);

        let mut out = Vec::with_capacity(256);
        out.extend_from_slice(b"MM");
        out.extend_from_slice(&42u16.to_be_bytes());
        out.extend_from_slice(&8u32.to_be_bytes());
        write_ifd(&mut out, &ifd0);
        if has_exif {
            write_ifd(&mut out, &exif);
        }
        if self.interop.is_some() {
            write_ifd(&mut out, &interop);
        }
        if let Some(gps) = gps {
            write_ifd(&mut out, &gps);
        }
        out
    }
}

fn gps_entries(gps: &GpsGroup) -> Vec<Entry> {
    let mut e = vec![
        Entry::new(GPS_VERSION_ID, Value::Byte(gps.version.to_vec())),
        Entry::new(
            GPS_LATITUDE_REF,
            Value::Ascii(gps.latitude.reference_char().to_string()),
        ),
        Entry::new(GPS_LATITUDE, Value::Rational(gps.latitude.dms.to_vec())),
        Entry::new(
            GPS_LONGITUDE_REF,
            Value::Ascii(gps.longitude.reference_char().to_string()),
        ),
        Entry::new(GPS_LONGITUDE, Value::Rational(gps.longitude.dms.to_vec())),
    ];
    if let Some(alt) = gps.altitude {
        e.push(Entry::new(
            GPS_ALTITUDE_REF,
            Value::Byte(vec![alt.below_sea_level as u8]),
        ));
        e.push(Entry::new(GPS_ALTITUDE, Value::Rational(vec![alt.meters])));
    }
    if let Some(ts) = gps.time_stamp {
        e.push(Entry::new(GPS_TIME_STAMP, Value::Rational(ts.to_vec())));
    }
    if let Some(dop) = gps.dop {
        e.push(Entry::new(GPS_DOP, Value::Rational(vec![dop])));
    }
    if let Some(speed) = gps.speed_kmh {
        e.push(Entry::new(GPS_SPEED_REF, Value::Ascii("K".into())));
        e.push(Entry::new(GPS_SPEED, Value::Rational(vec![speed])));
    }
    if let Some(dir) = gps.img_direction {
        e.push(Entry::new(GPS_IMG_DIRECTION_REF, Value::Ascii("T".into())));
        e.push(Entry::new(GPS_IMG_DIRECTION, Value::Rational(vec![dir])));
    }
    if let Some(date) = &gps.date_stamp {
        e.push(Entry::new(GPS_DATE_STAMP, Value::Ascii(date.clone())));
    }
    e
}

// ---------------------------------------------------------------------------
// TIFF reader
// ---------------------------------------------------------------------------

struct TiffReader<'a> {
    data: &'a [u8],
    big_endian: bool,
}

/// An IFD entry with its value bytes resolved (inline or out-of-line).
struct RawEntry<'a> {
    tag: u16,
    typ: u16,
    count: usize,
    bytes: &'a [u8],
}

fn malformed(msg: impl Into<String>) -> CodecError {
    CodecError::Malformed(msg.into())
}

/// Byte size of one value of a TIFF field type.
fn type_size(typ: u16) -> usize {
    match typ {
        1 | 2 | 6 | 7 => 1, // BYTE, ASCII, SBYTE, UNDEFINED
        3 | 8 => 2,         // SHORT, SSHORT
        4 | 9 | 11 => 4,    // LONG, SLONG, FLOAT
        5 | 10 | 12 => 8,   // RATIONAL, SRATIONAL, DOUBLE
        _ => 1,
    }
}

impl<'a> TiffReader<'a> {
    fn new(data: &'a [u8]) -> Result<Self, CodecError> {
        if data.len() < 8 {
            return Err(malformed("TIFF header truncated"));
        }
        let big_endian = match &data[0..2] {
            b"MM" => true,
            b"II" => false,
            _ => return Err(malformed("unknown byte order marker")),
        };
        let reader = Self { data, big_endian };
        if reader.u16_at(2)? != 42 {
            return Err(malformed("bad TIFF magic"));
        }
        Ok(reader)
    }

    fn slice(&self, offset: usize, len: usize) -> Result<&'a [u8], CodecError> {
        offset
            .checked_add(len)
            .and_then(|end| self.data.get(offset..end))
            .ok_or_else(|| malformed(format!("read of {len} bytes at {offset} out of bounds")))
    }

    fn u16_at(&self, offset: usize) -> Result<u16, CodecError> {
        let b = self.slice(offset, 2)?;
        Ok(self.u16_from(b))
    }

    fn u32_at(&self, offset: usize) -> Result<u32, CodecError> {
        let b = self.slice(offset, 4)?;
        Ok(self.u32_from(b))
    }

    fn u16_from(&self, b: &[u8]) -> u16 {
        if self.big_endian {
            u16::from_be_bytes([b[0], b[1]])
        } else {
            u16::from_le_bytes([b[0], b[1]])
        }
    }

    fn u32_from(&self, b: &[u8]) -> u32 {
        if self.big_endian {
            u32::from_be_bytes([b[0], b[1], b[2], b[3]])
        } else {
            u32::from_le_bytes([b[0], b[1], b[2], b[3]])
        }
    }

    /// Read one IFD. A truncated entry table is malformed; an entry whose
    /// value lies outside the payload is skipped, since camera blocks often
    /// carry broken vendor tags next to the ones read here.
    fn read_ifd(&self, offset: usize) -> Result<Vec<RawEntry<'a>>, CodecError> {
        let count = self.u16_at(offset)? as usize;
        self.slice(offset + 2, count * 12)?;
        let mut entries = Vec::with_capacity(count);
        for i in 0..count {
            let at = offset + 2 + i * 12;
            let tag = self.u16_at(at)?;
            let typ = self.u16_at(at + 2)?;
            let n = self.u32_at(at + 4)? as usize;
            let Some(bytes) = self.entry_value(at, n, typ) else {
                debug!(tag, "skipping EXIF tag with unreadable value");
                continue;
            };
            entries.push(RawEntry {
                tag,
                typ,
                count: n,
                bytes,
            });
        }
        Ok(entries)
    }

    /// Value bytes of the entry at `at`: inline when they fit in four bytes,
    /// otherwise at the offset stored there.
    fn entry_value(&self, at: usize, count: usize, typ: u16) -> Option<&'a [u8]> {
        let len = count.checked_mul(type_size(typ))?;
        if len <= 4 {
            self.slice(at + 8, len).ok()
        } else {
            let offset = self.u32_at(at + 8).ok()? as usize;
            self.slice(offset, len).ok()
        }
    }

    fn ascii(&self, e: &RawEntry) -> Option<String> {
        (e.typ == 2).then(|| {
            String::from_utf8_lossy(e.bytes)
                .trim_end_matches('\0')
                .to_string()
        })
    }

    fn short(&self, e: &RawEntry) -> Option<u16> {
        match e.typ {
            3 if e.count >= 1 => Some(self.u16_from(e.bytes)),
            _ => None,
        }
    }

    fn long(&self, e: &RawEntry) -> Option<u32> {
        match e.typ {
            4 if e.count >= 1 => Some(self.u32_from(e.bytes)),
            // Some writers store sub-IFD pointers as SHORT
            3 if e.count >= 1 => Some(self.u16_from(e.bytes) as u32),
            _ => None,
        }
    }

    fn rationals(&self, e: &RawEntry) -> Option<Vec<Rational>> {
        (e.typ == 5).then(|| {
            e.bytes
                .chunks_exact(8)
                .map(|c| (self.u32_from(&c[..4]), self.u32_from(&c[4..])))
                .collect()
        })
    }

    fn rational_triple(&self, e: &RawEntry) -> Option<[Rational; 3]> {
        let v = self.rationals(e)?;
        (v.len() == 3).then(|| [v[0], v[1], v[2]])
    }

    fn sub_ifd(&self, entries: &[RawEntry], tag: u16) -> Result<Option<Vec<RawEntry<'a>>>, CodecError> {
        match entries.iter().find(|e| e.tag == tag).and_then(|e| self.long(e)) {
            Some(offset) => self.read_ifd(offset as usize).map(Some),
            None => Ok(None),
        }
    }
}

impl MetadataBlock {
    /// Parse a TIFF payload (no `Exif\0\0` prefix). Unknown tags are ignored.
    pub fn from_tiff(data: &[u8]) -> Result<Self, CodecError> {
        let r = TiffReader::new(data)?;
        let ifd0 = r.read_ifd(r.u32_at(4)? as usize)?;

        let mut block = MetadataBlock::default();
        for e in &ifd0 {
            match e.tag {
                TAG_DATE_TIME => block.image.date_time = r.ascii(e),
                TAG_ORIENTATION => block.image.orientation = r.short(e),
                _ => {}
            }
        }

        if let Some(exif) = r.sub_ifd(&ifd0, TAG_EXIF_IFD)? {
            for e in &exif {
                match e.tag {
                    TAG_DATE_TIME_ORIGINAL => block.photo.date_time_original = r.ascii(e),
                    TAG_USER_COMMENT => block.photo.user_comment = Some(e.bytes.to_vec()),
                    _ => {}
                }
            }
            if r.sub_ifd(&exif, TAG_INTEROP_IFD)?.is_some() {
                block.interop = Some(InteropGroup);
            }
        }

        if let Some(gps) = r.sub_ifd(&ifd0, TAG_GPS_IFD)? {
            block.gps = parse_gps(&r, &gps);
        }

        Ok(block)
    }
}

/// Assemble the GPS group. A group without both coordinates is dropped.
fn parse_gps(r: &TiffReader, entries: &[RawEntry]) -> Option<GpsGroup> {
    let find = |tag: u16| entries.iter().find(|e| e.tag == tag);
    let reference = |tag: u16| {
        find(tag)
            .and_then(|e| r.ascii(e))
            .and_then(|s| s.bytes().next())
    };

    let latitude = GpsCoordinate {
        reference: reference(GPS_LATITUDE_REF)?,
        dms: find(GPS_LATITUDE).and_then(|e| r.rational_triple(e))?,
    };
    let longitude = GpsCoordinate {
        reference: reference(GPS_LONGITUDE_REF)?,
        dms: find(GPS_LONGITUDE).and_then(|e| r.rational_triple(e))?,
    };

    let single = |tag: u16| {
        find(tag)
            .and_then(|e| r.rationals(e))
            .and_then(|v| v.first().copied())
    };

    let version = find(GPS_VERSION_ID)
        .filter(|e| e.bytes.len() == 4)
        .map(|e| [e.bytes[0], e.bytes[1], e.bytes[2], e.bytes[3]])
        .unwrap_or([2, 3, 0, 0]);

    let altitude = single(GPS_ALTITUDE).map(|meters| GpsAltitude {
        below_sea_level: find(GPS_ALTITUDE_REF)
            .and_then(|e| e.bytes.first())
            .is_some_and(|&b| b == 1),
        meters,
    });

    Some(GpsGroup {
        version,
        latitude,
        longitude,
        altitude,
        time_stamp: find(GPS_TIME_STAMP).and_then(|e| r.rational_triple(e)),
        dop: single(GPS_DOP),
        speed_kmh: single(GPS_SPEED),
        img_direction: single(GPS_IMG_DIRECTION),
        date_stamp: find(GPS_DATE_STAMP).and_then(|e| r.ascii(e)),
    })
}
