//! Native GeoTIFF reading/writing on top of the `tiff` crate.
//!
//! Georeferencing comes from ModelPixelScale + ModelTiepoint, the CRS from
//! the GeoKey directory (EPSG codes only) and no-data from GDAL's ASCII tag.

use crate::crs::CRS;
use crate::error::{Error, Result};
use crate::raster::{GeoTransform, Raster, RasterElement};
use num_traits::NumCast;
use std::fs::File;
use std::io::{BufReader, BufWriter, Cursor, Read, Seek, Write};
use std::path::Path;
use tiff::decoder::{Decoder, DecodingResult, Limits};
use tiff::encoder::colortype::Gray32Float;
use tiff::encoder::TiffEncoder;
use tiff::tags::Tag;
use tracing::{debug, warn};

const MODEL_PIXEL_SCALE: u16 = 33550;
const MODEL_TIEPOINT: u16 = 33922;
const GEO_KEY_DIRECTORY: u16 = 34735;
const GDAL_NODATA: u16 = 42113;

const GT_MODEL_TYPE_KEY: u16 = 1024;
const GT_RASTER_TYPE_KEY: u16 = 1025;
const GEOGRAPHIC_TYPE_KEY: u16 = 2048;
const PROJECTED_CS_TYPE_KEY: u16 = 3072;

/// Options for writing GeoTIFF files
#[derive(Debug, Clone, Default)]
pub struct GeoTiffOptions {
    /// Write the raster's no-data value to the GDAL_NODATA tag
    pub write_nodata: bool,
}

/// Read one band of a GeoTIFF file into a Raster.
///
/// `band` is 1-based; `None` reads band 1.
pub fn read_geotiff<T, P>(path: P, band: Option<usize>) -> Result<Raster<T>>
where
    T: RasterElement,
    P: AsRef<Path>,
{
    let path = path.as_ref();
    debug!("Reading GeoTIFF {}", path.display());
    let file = File::open(path)?;
    decode_geotiff(BufReader::new(file), band)
}

/// Read one band of an in-memory GeoTIFF
pub fn read_geotiff_from_buffer<T>(data: &[u8], band: Option<usize>) -> Result<Raster<T>>
where
    T: RasterElement,
{
    decode_geotiff(Cursor::new(data), band)
}

fn decode_geotiff<T, R>(reader: R, band: Option<usize>) -> Result<Raster<T>>
where
    T: RasterElement,
    R: Read + Seek,
{
    let mut decoder = Decoder::new(reader)
        .map_err(|e| Error::Other(format!("TIFF decode error: {e}")))?
        .with_limits(Limits::unlimited());

    let (width, height) = decoder
        .dimensions()
        .map_err(|e| Error::Other(format!("Cannot read dimensions: {e}")))?;
    let rows = height as usize;
    let cols = width as usize;
    if rows == 0 || cols == 0 {
        return Err(Error::InvalidDimensions {
            width: cols,
            height: rows,
        });
    }

    let band = band.unwrap_or(1);
    let image = decoder
        .read_image()
        .map_err(|e| Error::Other(format!("Cannot read image data: {e}")))?;

    let data: Vec<T> = match image {
        DecodingResult::U8(buf) => select_band(&buf, rows * cols, band)?,
        DecodingResult::U16(buf) => select_band(&buf, rows * cols, band)?,
        DecodingResult::U32(buf) => select_band(&buf, rows * cols, band)?,
        DecodingResult::U64(buf) => select_band(&buf, rows * cols, band)?,
        DecodingResult::I8(buf) => select_band(&buf, rows * cols, band)?,
        DecodingResult::I16(buf) => select_band(&buf, rows * cols, band)?,
        DecodingResult::I32(buf) => select_band(&buf, rows * cols, band)?,
        DecodingResult::I64(buf) => select_band(&buf, rows * cols, band)?,
        DecodingResult::F32(buf) => select_band(&buf, rows * cols, band)?,
        DecodingResult::F64(buf) => select_band(&buf, rows * cols, band)?,
        #[allow(unreachable_patterns)]
        _ => {
            return Err(Error::UnsupportedDataType(
                "Unsupported TIFF sample format".to_string(),
            ))
        }
    };

    let mut raster = Raster::from_vec(data, rows, cols)?;

    match read_geotransform(&mut decoder) {
        Some(transform) => raster.set_transform(transform),
        None => warn!("No georeferencing tags found; using identity pixel grid"),
    }
    raster.set_crs(read_crs(&mut decoder));
    raster.set_nodata(read_nodata(&mut decoder));

    Ok(raster)
}

/// Pick `band` (1-based) out of pixel-interleaved samples
fn select_band<S, T>(buf: &[S], cells: usize, band: usize) -> Result<Vec<T>>
where
    S: NumCast + Copy,
    T: RasterElement,
{
    let bands = if cells == 0 { 0 } else { buf.len() / cells };
    if bands == 0 || bands * cells != buf.len() {
        return Err(Error::Other(format!(
            "Sample count {} does not match {} cells",
            buf.len(),
            cells
        )));
    }
    if band == 0 || band > bands {
        return Err(Error::BandOutOfRange { band, bands });
    }

    Ok(buf
        .iter()
        .skip(band - 1)
        .step_by(bands)
        .map(|&v| num_traits::cast(v).unwrap_or_else(T::fallback_nodata))
        .collect())
}

fn read_geotransform<R: Read + Seek>(decoder: &mut Decoder<R>) -> Option<GeoTransform> {
    let scale = decoder.get_tag_f64_vec(Tag::from_u16_exhaustive(MODEL_PIXEL_SCALE)).ok()?;
    let tiepoint = decoder.get_tag_f64_vec(Tag::from_u16_exhaustive(MODEL_TIEPOINT)).ok()?;

    if scale.len() < 2 || tiepoint.len() < 6 {
        return None;
    }

    // tiepoint: [I, J, K, X, Y, Z], scale: [ScaleX, ScaleY, ScaleZ]
    let origin_x = tiepoint[3] - tiepoint[0] * scale[0];
    let origin_y = tiepoint[4] + tiepoint[1] * scale[1];
    Some(GeoTransform::new(origin_x, origin_y, scale[0], -scale[1]))
}

fn read_crs<R: Read + Seek>(decoder: &mut Decoder<R>) -> Option<CRS> {
    let keys = decoder.get_tag_u16_vec(Tag::from_u16_exhaustive(GEO_KEY_DIRECTORY)).ok()?;
    let epsg = geokey_epsg(&keys)?;
    Some(CRS::from_epsg(epsg))
}

/// EPSG code from an inline ProjectedCSType or GeographicType geokey
fn geokey_epsg(keys: &[u16]) -> Option<u32> {
    let count = *keys.get(3)? as usize;
    let entries = keys.get(4..4 + count * 4)?;

    let lookup = |wanted: u16| {
        entries
            .chunks_exact(4)
            .find(|e| e[0] == wanted && e[1] == 0)
            .map(|e| e[3] as u32)
            .filter(|&code| code != 0 && code != 32767)
    };

    lookup(PROJECTED_CS_TYPE_KEY).or_else(|| lookup(GEOGRAPHIC_TYPE_KEY))
}

fn read_nodata<T, R>(decoder: &mut Decoder<R>) -> Option<T>
where
    T: RasterElement,
    R: Read + Seek,
{
    let text = decoder.get_tag_ascii_string(Tag::from_u16_exhaustive(GDAL_NODATA)).ok()?;
    let text = text.trim_matches(|c: char| c == '\0' || c.is_whitespace());
    let parsed: f64 = match text.parse() {
        Ok(v) => v,
        Err(_) => {
            warn!("Ignoring unparseable GDAL_NODATA value {:?}", text);
            return None;
        }
    };
    if parsed.is_nan() {
        // NaN cells are no-data for float rasters regardless
        return None;
    }
    let nodata = T::from_f64(parsed);
    if nodata.is_none() {
        warn!("GDAL_NODATA value {} does not fit the raster type", parsed);
    }
    nodata
}

/// Write a Raster to a Float32 GeoTIFF file
pub fn write_geotiff<T, P>(raster: &Raster<T>, path: P, options: Option<GeoTiffOptions>) -> Result<()>
where
    T: RasterElement,
    P: AsRef<Path>,
{
    let file = File::create(path.as_ref())?;
    let mut writer = BufWriter::new(file);
    encode_geotiff(raster, &mut writer, &options.unwrap_or_default())?;
    writer.flush()?;
    Ok(())
}

/// Write a Raster to an in-memory Float32 GeoTIFF
pub fn write_geotiff_to_buffer<T>(raster: &Raster<T>, options: Option<GeoTiffOptions>) -> Result<Vec<u8>>
where
    T: RasterElement,
{
    let mut buf = Vec::new();
    encode_geotiff(raster, Cursor::new(&mut buf), &options.unwrap_or_default())?;
    Ok(buf)
}

fn encode_geotiff<T, W>(raster: &Raster<T>, writer: W, options: &GeoTiffOptions) -> Result<()>
where
    T: RasterElement,
    W: Write + Seek,
{
    let tiff_err = |what: &str, e: tiff::TiffError| Error::Other(format!("{what}: {e}"));

    let mut encoder = TiffEncoder::new(writer).map_err(|e| tiff_err("TIFF encoder error", e))?;
    let (rows, cols) = raster.shape();

    let data: Vec<f32> = raster
        .data()
        .iter()
        .map(|&v| num_traits::cast(v).unwrap_or(f32::NAN))
        .collect();

    let mut image = encoder
        .new_image::<Gray32Float>(cols as u32, rows as u32)
        .map_err(|e| tiff_err("Cannot create TIFF image", e))?;

    let gt = raster.transform();
    let scale = [gt.pixel_width, gt.pixel_height.abs(), 0.0];
    image
        .encoder()
        .write_tag(Tag::Unknown(MODEL_PIXEL_SCALE), &scale[..])
        .map_err(|e| tiff_err("Cannot write scale tag", e))?;

    let tiepoint = [0.0, 0.0, 0.0, gt.origin_x, gt.origin_y, 0.0];
    image
        .encoder()
        .write_tag(Tag::Unknown(MODEL_TIEPOINT), &tiepoint[..])
        .map_err(|e| tiff_err("Cannot write tiepoint tag", e))?;

    let geokeys = geokey_directory(raster.crs());
    image
        .encoder()
        .write_tag(Tag::Unknown(GEO_KEY_DIRECTORY), geokeys.as_slice())
        .map_err(|e| tiff_err("Cannot write geokey tag", e))?;

    if options.write_nodata {
        if let Some(nodata) = raster.nodata().and_then(RasterElement::to_f64) {
            let text = nodata.to_string();
            image
                .encoder()
                .write_tag(Tag::Unknown(GDAL_NODATA), text.as_str())
                .map_err(|e| tiff_err("Cannot write nodata tag", e))?;
        }
    }

    image
        .write_data(&data)
        .map_err(|e| tiff_err("Cannot write image data", e))?;

    Ok(())
}

/// GeoKey directory with model type, raster type and, when known, the EPSG code.
/// Codes in 4000..5000 are written as geographic, everything else as projected.
fn geokey_directory(crs: Option<&CRS>) -> Vec<u16> {
    let epsg = crs
        .and_then(CRS::epsg)
        .and_then(|code| u16::try_from(code).ok());
    let geographic = epsg.is_some_and(|code| (4000..5000).contains(&code));
    let model_type = if geographic { 2 } else { 1 };

    let mut keys = vec![
        1, 1, 0, 2,
        GT_MODEL_TYPE_KEY, 0, 1, model_type,
        GT_RASTER_TYPE_KEY, 0, 1, 1, // RasterPixelIsArea
    ];
    if let Some(code) = epsg {
        let key = if geographic { GEOGRAPHIC_TYPE_KEY } else { PROJECTED_CS_TYPE_KEY };
        keys.extend_from_slice(&[key, 0, 1, code]);
        keys[3] = 3;
    }
    keys
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_select_band_interleaved() {
        // 2 cells, 3 samples each
        let buf: Vec<u8> = vec![1, 2, 3, 4, 5, 6];
        let band2: Vec<f64> = select_band(&buf, 2, 2).unwrap();
        assert_eq!(band2, vec![2.0, 5.0]);

        let err = select_band::<u8, f64>(&buf, 2, 4).unwrap_err();
        assert!(matches!(err, Error::BandOutOfRange { band: 4, bands: 3 }));
    }

    #[test]
    fn test_geokey_roundtrip() {
        let projected = geokey_directory(Some(&CRS::from_epsg(32719)));
        assert_eq!(geokey_epsg(&projected), Some(32719));

        let geographic = geokey_directory(Some(&CRS::wgs84()));
        assert_eq!(geokey_epsg(&geographic), Some(4326));
        assert_eq!(geographic[7], 2);

        assert_eq!(geokey_epsg(&geokey_directory(None)), None);
    }
}
