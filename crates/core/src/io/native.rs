//! Native GeoTIFF reading/writing
//!
//! Uses the `tiff` crate. Georeferencing is limited to what mobility
//! rasters need: the pixel-scale/tiepoint pair, the EPSG code from the
//! GeoKey directory, and the GDAL no-data tag.

use crate::crs::CRS;
use crate::error::{Error, Result};
use crate::raster::{GeoTransform, Raster, RasterElement};
use std::fs::File;
use std::io::{BufWriter, Cursor};
use std::path::Path;
use tiff::decoder::{Decoder, DecodingResult};
use tiff::encoder::colortype::Gray32Float;
use tiff::encoder::TiffEncoder;
use tiff::tags::Tag;

const MODEL_PIXEL_SCALE: u16 = 33550;
const MODEL_TIEPOINT: u16 = 33922;
const GEO_KEY_DIRECTORY: u16 = 34735;
const GDAL_NODATA: u16 = 42113;

const GT_MODEL_TYPE_KEY: u16 = 1024;
const GT_RASTER_TYPE_KEY: u16 = 1025;
const GEOGRAPHIC_TYPE_KEY: u16 = 2048;
const PROJECTED_CS_TYPE_KEY: u16 = 3072;

/// Options for writing GeoTIFF files
#[derive(Debug, Clone)]
pub struct GeoTiffOptions {
    /// Write the GDAL no-data tag (value `nan`)
    pub nodata_tag: bool,
}

impl Default for GeoTiffOptions {
    fn default() -> Self {
        Self { nodata_tag: true }
    }
}

/// Read a GeoTIFF file into a Raster
pub fn read_geotiff<T, P>(path: P) -> Result<Raster<T>>
where
    T: RasterElement,
    P: AsRef<Path>,
{
    let file = File::open(path.as_ref())?;
    decode_geotiff(file)
}

/// Read a GeoTIFF from an in-memory buffer into a Raster
pub fn read_geotiff_from_buffer<T>(data: &[u8]) -> Result<Raster<T>>
where
    T: RasterElement,
{
    decode_geotiff(Cursor::new(data))
}

fn cast_all<S, T>(buf: Vec<S>) -> Vec<T>
where
    S: num_traits::NumCast + Copy,
    T: RasterElement,
{
    buf.into_iter()
        .map(|v| num_traits::cast(v).unwrap_or_else(T::default_nodata))
        .collect()
}

fn decode_geotiff<T, R>(reader: R) -> Result<Raster<T>>
where
    T: RasterElement,
    R: std::io::Read + std::io::Seek,
{
    let mut decoder = Decoder::new(reader)
        .map_err(|e| Error::external("GeoTIFF decode", e.to_string()))?;

    let (width, height) = decoder
        .dimensions()
        .map_err(|e| Error::external("GeoTIFF decode", format!("cannot read dimensions: {}", e)))?;

    let rows = height as usize;
    let cols = width as usize;

    let result = decoder
        .read_image()
        .map_err(|e| Error::external("GeoTIFF decode", format!("cannot read image data: {}", e)))?;

    let data: Vec<T> = match result {
        DecodingResult::F32(buf) => cast_all(buf),
        DecodingResult::F64(buf) => cast_all(buf),
        DecodingResult::U8(buf) => cast_all(buf),
        DecodingResult::U16(buf) => cast_all(buf),
        DecodingResult::U32(buf) => cast_all(buf),
        DecodingResult::I8(buf) => cast_all(buf),
        DecodingResult::I16(buf) => cast_all(buf),
        DecodingResult::I32(buf) => cast_all(buf),
        _ => return Err(Error::UnsupportedDataType("unsupported TIFF pixel format".to_string())),
    };

    if data.len() != rows * cols {
        return Err(Error::InvalidDimensions {
            width: cols,
            height: rows,
        });
    }

    let mut raster = Raster::from_vec(data, rows, cols)?;

    if let Some(transform) = read_geotransform(&mut decoder) {
        raster.set_transform(transform);
    }
    raster.set_crs(read_epsg(&mut decoder).map(CRS::from_epsg));

    let nodata = decoder
        .get_tag_ascii_string(Tag::Unknown(GDAL_NODATA))
        .ok()
        .and_then(|s| s.trim_matches(char::from(0)).trim().parse::<f64>().ok())
        .and_then(|v| num_traits::cast::<f64, T>(v));
    raster.set_nodata(nodata);

    Ok(raster)
}

/// GeoTransform from ModelPixelScale + ModelTiepoint
fn read_geotransform<R: std::io::Read + std::io::Seek>(decoder: &mut Decoder<R>) -> Option<GeoTransform> {
    let scale = decoder.get_tag_f64_vec(Tag::Unknown(MODEL_PIXEL_SCALE)).ok()?;
    let tiepoint = decoder.get_tag_f64_vec(Tag::Unknown(MODEL_TIEPOINT)).ok()?;

    if scale.len() < 2 || tiepoint.len() < 6 {
        return None;
    }

    // tiepoint: [I, J, K, X, Y, Z]
    let origin_x = tiepoint[3] - tiepoint[0] * scale[0];
    let origin_y = tiepoint[4] + tiepoint[1] * scale[1];
    Some(GeoTransform::new(origin_x, origin_y, scale[0], -scale[1]))
}

/// EPSG code from the GeoKey directory (projected key first, then geographic)
fn read_epsg<R: std::io::Read + std::io::Seek>(decoder: &mut Decoder<R>) -> Option<u32> {
    let keys = decoder.get_tag_u32_vec(Tag::Unknown(GEO_KEY_DIRECTORY)).ok()?;
    if keys.len() < 4 {
        return None;
    }

    // Header is 4 shorts; each entry is (key, location, count, value).
    // Location 0 means the value is stored inline.
    let entries: Vec<&[u32]> = keys[4..].chunks_exact(4).collect();
    [PROJECTED_CS_TYPE_KEY, GEOGRAPHIC_TYPE_KEY].iter().find_map(|&wanted| {
        entries
            .iter()
            .find(|e| e[0] == wanted as u32 && e[1] == 0)
            .map(|e| e[3])
            .filter(|&code| code > 0 && code < 32767)
    })
}

/// Write a Raster to a GeoTIFF file (32-bit float)
pub fn write_geotiff<T, P>(raster: &Raster<T>, path: P, options: Option<GeoTiffOptions>) -> Result<()>
where
    T: RasterElement,
    P: AsRef<Path>,
{
    let file = BufWriter::new(File::create(path.as_ref())?);
    encode_geotiff(raster, file, &options.unwrap_or_default())
}

/// Write a Raster to an in-memory GeoTIFF buffer
pub fn write_geotiff_to_buffer<T>(raster: &Raster<T>, options: Option<GeoTiffOptions>) -> Result<Vec<u8>>
where
    T: RasterElement,
{
    let mut buf = Vec::new();
    encode_geotiff(raster, Cursor::new(&mut buf), &options.unwrap_or_default())?;
    Ok(buf)
}

fn geokeys_for(crs: Option<&CRS>) -> Vec<u16> {
    let epsg = crs.and_then(CRS::epsg).and_then(|c| u16::try_from(c).ok());
    // GTModelType: 1 = projected, 2 = geographic
    let model_type = if crs.map_or(false, CRS::is_geographic) { 2 } else { 1 };

    let mut entries: Vec<[u16; 4]> = vec![
        [GT_MODEL_TYPE_KEY, 0, 1, model_type],
        [GT_RASTER_TYPE_KEY, 0, 1, 1], // RasterPixelIsArea
    ];
    if let Some(code) = epsg {
        let key = if model_type == 2 { GEOGRAPHIC_TYPE_KEY } else { PROJECTED_CS_TYPE_KEY };
        entries.push([key, 0, 1, code]);
    }

    let mut keys = vec![1, 1, 0, entries.len() as u16];
    keys.extend(entries.into_iter().flatten());
    keys
}

fn encode_geotiff<T, W>(raster: &Raster<T>, writer: W, options: &GeoTiffOptions) -> Result<()>
where
    T: RasterElement,
    W: std::io::Write + std::io::Seek,
{
    let encode_err = |e: tiff::TiffError| Error::external("GeoTIFF encode", e.to_string());

    let mut encoder = TiffEncoder::new(writer).map_err(encode_err)?;
    let (rows, cols) = raster.shape();

    // No-data cells are written as NaN whatever the source sentinel was
    let data: Vec<f32> = raster
        .data()
        .iter()
        .map(|&v| {
            if raster.is_nodata(v) {
                f32::NAN
            } else {
                num_traits::cast(v).unwrap_or(f32::NAN)
            }
        })
        .collect();

    let mut image = encoder
        .new_image::<Gray32Float>(cols as u32, rows as u32)
        .map_err(encode_err)?;

    let gt = raster.transform();
    let scale = [gt.pixel_width, gt.pixel_height.abs(), 0.0];
    image
        .encoder()
        .write_tag(Tag::Unknown(MODEL_PIXEL_SCALE), &scale[..])
        .map_err(encode_err)?;

    let tiepoint = [0.0, 0.0, 0.0, gt.origin_x, gt.origin_y, 0.0];
    image
        .encoder()
        .write_tag(Tag::Unknown(MODEL_TIEPOINT), &tiepoint[..])
        .map_err(encode_err)?;

    let geokeys = geokeys_for(raster.crs());
    image
        .encoder()
        .write_tag(Tag::Unknown(GEO_KEY_DIRECTORY), geokeys.as_slice())
        .map_err(encode_err)?;

    if options.nodata_tag {
        image
            .encoder()
            .write_tag(Tag::Unknown(GDAL_NODATA), "nan")
            .map_err(encode_err)?;
    }

    image.write_data(&data).map_err(encode_err)?;

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    fn sample() -> Raster<f64> {
        let mut r = Raster::from_vec(vec![1.0, 2.5, f64::NAN, 4.0, 5.0, 6.0], 2, 3).unwrap();
        r.set_transform(GeoTransform::new(500000.0, 3500000.0, 30.0, -30.0));
        r.set_crs(Some(CRS::from_epsg(32612)));
        r.set_nodata(Some(f64::NAN));
        r
    }

    #[test]
    fn test_buffer_roundtrip_keeps_georeferencing() {
        let buf = write_geotiff_to_buffer(&sample(), None).unwrap();
        let back: Raster<f64> = read_geotiff_from_buffer(&buf).unwrap();

        assert_eq!(back.shape(), (2, 3));
        assert_relative_eq!(back.get(0, 1).unwrap(), 2.5, epsilon = 1e-6);
        assert!(back.get(0, 2).unwrap().is_nan());
        assert!(back.transform().approx_eq(sample().transform(), 1e-6));
        assert_eq!(back.crs().and_then(|c| c.epsg()), Some(32612));
    }

    #[test]
    fn test_sentinel_nodata_written_as_nan() {
        let mut r = Raster::from_vec(vec![-9999.0, 1.0], 1, 2).unwrap();
        r.set_nodata(Some(-9999.0));
        let buf = write_geotiff_to_buffer(&r, None).unwrap();
        let back: Raster<f64> = read_geotiff_from_buffer(&buf).unwrap();
        assert!(back.get(0, 0).unwrap().is_nan());
    }

    #[test]
    fn test_file_roundtrip() {
        let tmp = tempfile::NamedTempFile::new().unwrap();
        write_geotiff(&sample(), tmp.path(), Some(GeoTiffOptions { nodata_tag: false })).unwrap();
        let back: Raster<f64> = read_geotiff(tmp.path()).unwrap();
        assert_eq!(back.shape(), (2, 3));
        assert_relative_eq!(back.get(1, 2).unwrap(), 6.0, epsilon = 1e-6);
    }

    #[test]
    fn test_geographic_geokeys() {
        let keys = geokeys_for(Some(&CRS::wgs84()));
        assert_eq!(&keys[..4], &[1, 1, 0, 3]);
        assert_eq!(&keys[4..8], &[GT_MODEL_TYPE_KEY, 0, 1, 2]);
        assert_eq!(&keys[12..16], &[GEOGRAPHIC_TYPE_KEY, 0, 1, 4326]);
        assert_eq!(geokeys_for(None).len(), 12);
    }

    #[test]
    fn test_garbage_is_external_error() {
        let err = read_geotiff_from_buffer::<f64>(b"not a tiff").unwrap_err();
        assert!(matches!(err, Error::ExternalOperation { .. }));
    }
}
