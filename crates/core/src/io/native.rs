//! Native GeoTIFF reading/writing built on the `tiff` crate
//!
//! Supports single-band, uncompressed or decoder-supported compressed
//! rasters. Georeferencing is read from the pixel scale and tiepoint tags or
//! the ModelTransformation matrix. North-up grids are written with scale and
//! tiepoint, rotated ones with the matrix. The no-data value uses the GDAL_NODATA ASCII tag and the
//! projection is stored in GeoAsciiParams (plus an EPSG geokey when the
//! projection is an `EPSG:<code>` string).

use crate::error::{Error, Result};
use crate::projection::Projection;
use crate::raster::{Extent, GeoTransform, Raster, RasterElement, SampleKind};
use quick_xml::events::Event;
use quick_xml::Reader;
use std::collections::BTreeMap;
use std::fs::File;
use std::io::{Cursor, Read, Seek, Write};
use std::path::Path;
use tiff::decoder::{Decoder, DecodingResult};
use tiff::encoder::colortype::{self, ColorType};
use tiff::encoder::{TiffEncoder, TiffValue};
use tiff::tags::Tag;
use tracing::debug;

const MODEL_PIXEL_SCALE: u16 = 33550;
const MODEL_TIEPOINT: u16 = 33922;
const MODEL_TRANSFORMATION: u16 = 34264;
const GEO_KEY_DIRECTORY: u16 = 34735;
const GEO_ASCII_PARAMS: u16 = 34737;
const GDAL_METADATA: u16 = 42112;
const GDAL_NODATA: u16 = 42113;

const GT_MODEL_TYPE_KEY: u16 = 1024;
const GT_RASTER_TYPE_KEY: u16 = 1025;
const GEOGRAPHIC_TYPE_KEY: u16 = 2048;
const PROJECTED_CS_TYPE_KEY: u16 = 3072;
const PCS_CITATION_KEY: u16 = 3073;

fn geo_tag(code: u16) -> Tag {
    Tag::from_u16_exhaustive(code)
}

fn tiff_err<E: std::fmt::Display>(what: &str) -> impl Fn(E) -> Error + '_ {
    move |e| Error::Tiff {
        path: what.to_string(),
        reason: e.to_string(),
    }
}

/// Georeferencing and layout of a GeoTIFF, read without decoding pixels
#[derive(Debug, Clone, PartialEq)]
pub struct RasterHeader {
    pub rows: usize,
    pub cols: usize,
    pub transform: GeoTransform,
    pub projection: Option<Projection>,
    pub nodata: Option<f64>,
}

impl RasterHeader {
    /// Geographic extent described by the header
    pub fn extent(&self) -> Extent {
        Extent::of_grid(&self.transform, self.rows, self.cols)
    }
}

/// Read a GeoTIFF file into a Raster
pub fn read_geotiff<T, P>(path: P) -> Result<Raster<T>>
where
    T: RasterElement,
    P: AsRef<Path>,
{
    let path = path.as_ref();
    let file = File::open(path)?;
    decode_geotiff(file, &path.display().to_string())
}

/// Read a GeoTIFF from an in-memory buffer into a Raster
pub fn read_geotiff_from_buffer<T>(data: &[u8]) -> Result<Raster<T>>
where
    T: RasterElement,
{
    decode_geotiff(Cursor::new(data), "<buffer>")
}

/// Read dimensions and georeferencing of a GeoTIFF file
pub fn read_geotiff_header<P: AsRef<Path>>(path: P) -> Result<RasterHeader> {
    let path = path.as_ref();
    let file = File::open(path)?;
    let what = path.display().to_string();
    let mut decoder = Decoder::new(file).map_err(tiff_err(&what))?;
    decode_header(&mut decoder, &what)
}

/// Read dimensions and georeferencing from an in-memory GeoTIFF
pub fn read_geotiff_header_from_buffer(data: &[u8]) -> Result<RasterHeader> {
    let mut decoder = Decoder::new(Cursor::new(data)).map_err(tiff_err("<buffer>"))?;
    decode_header(&mut decoder, "<buffer>")
}

fn decode_header<R: Read + Seek>(decoder: &mut Decoder<R>, what: &str) -> Result<RasterHeader> {
    let (width, height) = decoder.dimensions().map_err(tiff_err(what))?;

    let transform =
        read_geotransform(decoder).ok_or_else(|| Error::MissingGeoreference(what.to_string()))?;

    let projection = read_projection(decoder);
    if projection.is_none() {
        debug!("{}: no projection information", what);
    }

    Ok(RasterHeader {
        rows: height as usize,
        cols: width as usize,
        transform,
        projection,
        nodata: read_nodata(decoder),
    })
}

fn decode_geotiff<T, R>(reader: R, what: &str) -> Result<Raster<T>>
where
    T: RasterElement,
    R: Read + Seek,
{
    let mut decoder = Decoder::new(reader).map_err(tiff_err(what))?;
    let header = decode_header(&mut decoder, what)?;
    let (rows, cols) = (header.rows, header.cols);

    let result = decoder.read_image().map_err(tiff_err(what))?;

    let nodata: Option<T> = header.nodata.and_then(num_traits::cast);
    let fallback = nodata.unwrap_or_else(T::sentinel);

    macro_rules! cast_all {
        ($buf:expr) => {
            $buf.iter()
                .map(|&v| num_traits::cast(v).unwrap_or(fallback))
                .collect::<Vec<T>>()
        };
    }

    let data: Vec<T> = match result {
        DecodingResult::U8(buf) => cast_all!(buf),
        DecodingResult::U16(buf) => cast_all!(buf),
        DecodingResult::U32(buf) => cast_all!(buf),
        DecodingResult::I8(buf) => cast_all!(buf),
        DecodingResult::I16(buf) => cast_all!(buf),
        DecodingResult::I32(buf) => cast_all!(buf),
        DecodingResult::F32(buf) => cast_all!(buf),
        DecodingResult::F64(buf) => cast_all!(buf),
        _ => {
            return Err(Error::UnsupportedDataType(format!(
                "{}: unsupported TIFF pixel format",
                what
            )))
        }
    };

    // multi-sample images decode interleaved; only single band is supported
    if data.len() != rows * cols {
        return Err(Error::InvalidDimensions {
            width: cols,
            height: rows,
        });
    }

    let mut raster = Raster::from_vec(data, rows, cols)?;
    raster.set_transform(header.transform);
    raster.set_projection(header.projection);
    raster.set_nodata(nodata);
    Ok(raster)
}

fn read_geotransform<R: Read + Seek>(decoder: &mut Decoder<R>) -> Option<GeoTransform> {
    let scale = decoder.get_tag_f64_vec(geo_tag(MODEL_PIXEL_SCALE)).ok();
    let tiepoint = decoder.get_tag_f64_vec(geo_tag(MODEL_TIEPOINT)).ok();
    if let (Some(scale), Some(tiepoint)) = (scale, tiepoint) {
        if scale.len() >= 2 && tiepoint.len() >= 6 {
            // tiepoint: [I, J, K, X, Y, Z], scale: [ScaleX, ScaleY, ScaleZ]
            let origin_x = tiepoint[3] - tiepoint[0] * scale[0];
            let origin_y = tiepoint[4] + tiepoint[1] * scale[1];
            return Some(GeoTransform::new(origin_x, origin_y, scale[0], -scale[1]));
        }
    }

    // row-major 4x4 matrix; the first two rows map (col, row) to (x, y)
    let m = decoder.get_tag_f64_vec(geo_tag(MODEL_TRANSFORMATION)).ok()?;
    (m.len() >= 16).then(|| GeoTransform::from_gdal([m[3], m[0], m[1], m[7], m[4], m[5]]))
}

/// Dataset-level `name -> value` items of the GDAL metadata tag.
///
/// Empty when the file carries no such tag. HLS granules store their sun
/// and view angles here.
pub fn read_geotiff_metadata<P: AsRef<Path>>(path: P) -> Result<BTreeMap<String, String>> {
    let path = path.as_ref();
    let what = path.display().to_string();
    let mut decoder = Decoder::new(File::open(path)?).map_err(tiff_err(&what))?;
    match decoder.get_tag_ascii_string(geo_tag(GDAL_METADATA)) {
        Ok(xml) => parse_gdal_metadata(&xml, &what),
        Err(_) => Ok(BTreeMap::new()),
    }
}

fn parse_gdal_metadata(xml: &str, what: &str) -> Result<BTreeMap<String, String>> {
    let mut reader = Reader::from_str(xml.trim_end_matches('\0'));
    reader.trim_text(true);

    let mut items = BTreeMap::new();
    let mut current: Option<String> = None;
    let mut buf = Vec::new();
    loop {
        match reader.read_event_into(&mut buf) {
            Ok(Event::Start(e)) if e.name().as_ref() == b"Item" => {
                let mut name = None;
                let mut per_band = false;
                for attr in e.attributes().flatten() {
                    match attr.key.as_ref() {
                        b"name" => name = Some(String::from_utf8_lossy(&attr.value).into_owned()),
                        b"sample" => per_band = true,
                        _ => {}
                    }
                }
                current = name.filter(|_| !per_band);
            }
            Ok(Event::Text(t)) => {
                if let Some(name) = current.take() {
                    let value = t.unescape().map_err(tiff_err(what))?;
                    items.insert(name, value.trim().to_string());
                }
            }
            Ok(Event::End(_)) => current = None,
            Ok(Event::Eof) => break,
            Err(e) => return Err(tiff_err(what)(e)),
            _ => {}
        }
        buf.clear();
    }
    Ok(items)
}

fn read_nodata<R: Read + Seek>(decoder: &mut Decoder<R>) -> Option<f64> {
    let text = decoder.get_tag_ascii_string(geo_tag(GDAL_NODATA)).ok()?;
    text.trim_matches(|c: char| c == '\0' || c.is_whitespace())
        .parse()
        .ok()
}

fn read_projection<R: Read + Seek>(decoder: &mut Decoder<R>) -> Option<Projection> {
    if let Ok(text) = decoder.get_tag_ascii_string(geo_tag(GEO_ASCII_PARAMS)) {
        let text = text.trim_end_matches(['\0', '|']).trim();
        if !text.is_empty() {
            return Some(Projection::new(text));
        }
    }

    // Fall back to an EPSG code in the key directory
    let keys = decoder.get_tag_u16_vec(geo_tag(GEO_KEY_DIRECTORY)).ok()?;
    keys.get(4..)?
        .chunks_exact(4)
        .find(|k| (k[0] == PROJECTED_CS_TYPE_KEY || k[0] == GEOGRAPHIC_TYPE_KEY) && k[1] == 0)
        .map(|k| Projection::from_epsg(u32::from(k[3])))
}

/// Write a Raster to a GeoTIFF file in its native sample type
pub fn write_geotiff<T, P>(raster: &Raster<T>, path: P) -> Result<()>
where
    T: RasterElement,
    P: AsRef<Path>,
{
    let path = path.as_ref();
    let file = File::create(path)?;
    encode_geotiff(raster, file, &path.display().to_string())
}

/// Write a Raster to an in-memory GeoTIFF buffer
pub fn write_geotiff_to_buffer<T>(raster: &Raster<T>) -> Result<Vec<u8>>
where
    T: RasterElement,
{
    let mut buf = Vec::new();
    encode_geotiff(raster, Cursor::new(&mut buf), "<buffer>")?;
    Ok(buf)
}

fn encode_geotiff<T, W>(raster: &Raster<T>, writer: W, what: &str) -> Result<()>
where
    T: RasterElement,
    W: Write + Seek,
{
    let mut encoder = TiffEncoder::new(writer).map_err(tiff_err(what))?;

    match T::SAMPLE {
        SampleKind::U8 => write_image::<colortype::Gray8, _, _>(&mut encoder, raster, what),
        SampleKind::U16 => write_image::<colortype::Gray16, _, _>(&mut encoder, raster, what),
        SampleKind::U32 => write_image::<colortype::Gray32, _, _>(&mut encoder, raster, what),
        SampleKind::I16 => write_image::<colortype::GrayI16, _, _>(&mut encoder, raster, what),
        SampleKind::I32 => write_image::<colortype::GrayI32, _, _>(&mut encoder, raster, what),
        SampleKind::F32 => write_image::<colortype::Gray32Float, _, _>(&mut encoder, raster, what),
        SampleKind::F64 => write_image::<colortype::Gray64Float, _, _>(&mut encoder, raster, what),
    }
}

fn write_image<C, T, W>(encoder: &mut TiffEncoder<W>, raster: &Raster<T>, what: &str) -> Result<()>
where
    C: ColorType,
    C::Inner: num_traits::NumCast + Copy,
    [C::Inner]: TiffValue,
    T: RasterElement,
    W: Write + Seek,
{
    let (rows, cols) = raster.shape();

    let data: Vec<C::Inner> = raster
        .data()
        .iter()
        .map(|&v| {
            num_traits::cast(v).ok_or_else(|| {
                Error::UnsupportedDataType(format!("{what}: value {v:?} does not fit the sample type"))
            })
        })
        .collect::<Result<_>>()?;

    let mut image = encoder
        .new_image::<C>(cols as u32, rows as u32)
        .map_err(tiff_err(what))?;

    let gt = raster.transform();
    if gt.is_north_up() {
        let scale = [gt.pixel_width, gt.pixel_height.abs(), 0.0];
        image
            .encoder()
            .write_tag(geo_tag(MODEL_PIXEL_SCALE), &scale[..])
            .map_err(tiff_err(what))?;

        let tiepoint = [0.0, 0.0, 0.0, gt.origin_x, gt.origin_y, 0.0];
        image
            .encoder()
            .write_tag(geo_tag(MODEL_TIEPOINT), &tiepoint[..])
            .map_err(tiff_err(what))?;
    } else {
        #[rustfmt::skip]
        let matrix = [
            gt.pixel_width, gt.row_rotation, 0.0, gt.origin_x,
            gt.col_rotation, gt.pixel_height, 0.0, gt.origin_y,
            0.0, 0.0, 0.0, 0.0,
            0.0, 0.0, 0.0, 1.0,
        ];
        image
            .encoder()
            .write_tag(geo_tag(MODEL_TRANSFORMATION), &matrix[..])
            .map_err(tiff_err(what))?;
    }

    let geokeys = geokey_directory(raster.projection());
    image
        .encoder()
        .write_tag(geo_tag(GEO_KEY_DIRECTORY), geokeys.as_slice())
        .map_err(tiff_err(what))?;

    if let Some(projection) = raster.projection() {
        let ascii = format!("{}|", projection.as_str());
        image
            .encoder()
            .write_tag(geo_tag(GEO_ASCII_PARAMS), ascii.as_str())
            .map_err(tiff_err(what))?;
    }

    if let Some(nodata) = raster.nodata().and_then(|v| v.as_f64()) {
        let text = format_nodata(nodata);
        image
            .encoder()
            .write_tag(geo_tag(GDAL_NODATA), text.as_str())
            .map_err(tiff_err(what))?;
    }

    image.write_data(&data).map_err(tiff_err(what))?;

    Ok(())
}

/// Minimal GeoKeyDirectory: model/raster type, EPSG code when known, and a
/// citation pointing at the GeoAsciiParams projection string.
fn geokey_directory(projection: Option<&Projection>) -> Vec<u16> {
    let mut keys: Vec<[u16; 4]> = Vec::new();
    let epsg = projection
        .and_then(Projection::epsg)
        .and_then(|c| u16::try_from(c).ok());
    let geographic = matches!(epsg, Some(4000..=4999));

    keys.push([GT_MODEL_TYPE_KEY, 0, 1, if geographic { 2 } else { 1 }]);
    keys.push([GT_RASTER_TYPE_KEY, 0, 1, 1]);
    if let Some(code) = epsg {
        let key = if geographic {
            GEOGRAPHIC_TYPE_KEY
        } else {
            PROJECTED_CS_TYPE_KEY
        };
        keys.push([key, 0, 1, code]);
    }
    if let Some(p) = projection {
        let len = u16::try_from(p.as_str().len() + 1).unwrap_or(u16::MAX);
        keys.push([PCS_CITATION_KEY, GEO_ASCII_PARAMS, len, 0]);
    }
    keys.sort_by_key(|k| k[0]);

    let mut directory = vec![1, 1, 0, keys.len() as u16];
    directory.extend(keys.iter().flatten());
    directory
}

fn format_nodata(value: f64) -> String {
    if value.is_nan() {
        "nan".to_string()
    } else if value.fract() == 0.0 && value.abs() < 1e15 {
        format!("{}", value as i64)
    } else {
        format!("{value}")
    }
}
