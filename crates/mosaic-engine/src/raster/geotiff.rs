//! GeoTIFF persistence for finished output rasters.
//!
//! Pure Rust (no GDAL). Writes one IFD for the full-resolution band followed
//! by one reduced-resolution IFD per overview level, with georeferencing in
//! the standard GeoTIFF tags and the no-data value in the `GDAL_NODATA` tag.
//! Files estimated past the big-format threshold are written as BigTIFF.

use std::fs::File;
use std::io::{BufWriter, Seek, Write};
use std::path::Path;

use chip_common::PixelTransform;
use tiff::encoder::colortype::{
    ColorType, Gray16, Gray32, Gray32Float, Gray64Float, Gray8, GrayI16, GrayI32,
};
use tiff::encoder::{Compression, DeflateLevel, TiffEncoder, TiffKind};
use tiff::tags::Tag;
use tiff::TiffResult;
use tracing::{debug, info};

use crate::error::{MosaicError, Result};
use crate::profile::{Compression as OutputCompression, OutputProfile};
use crate::types::{DataType, RasterBlock};

// GeoTIFF tag IDs (not in the tiff crate)
const GEOTIFF_MODELPIXELSCALE: u16 = 33550;
const GEOTIFF_MODELTIEPOINT: u16 = 33922;
const GEOTIFF_GEOKEYDIRECTORY: u16 = 34735;
const GDAL_NODATA: u16 = 42113;

// GeoKey IDs
const GT_MODEL_TYPE_GEO_KEY: u16 = 1024;
const GT_RASTER_TYPE_GEO_KEY: u16 = 1025;
const PROJECTED_CS_TYPE_GEO_KEY: u16 = 3072;

// GeoKey values
const MODEL_TYPE_PROJECTED: u16 = 1;
const RASTER_PIXEL_IS_AREA: u16 = 1;
const USER_DEFINED: u16 = 32767;

/// NewSubfileType bit marking a reduced-resolution image.
const SUBFILE_REDUCED_IMAGE: u32 = 1;

/// Write the raster to a scratch file beside `path`, then rename it into place.
pub fn write_atomic(
    path: &Path,
    profile: &OutputProfile,
    pixels: &RasterBlock,
    overviews: &[(usize, RasterBlock)],
) -> Result<()> {
    let dir = match path.parent() {
        Some(p) if !p.as_os_str().is_empty() => p,
        _ => Path::new("."),
    };

    let scratch = tempfile::NamedTempFile::new_in(dir).map_err(|e| {
        MosaicError::OutputOpen(format!("{}: cannot create scratch file: {}", dir.display(), e))
    })?;

    {
        let file: &File = scratch.as_file();
        let mut writer = BufWriter::new(file);
        write_to(&mut writer, profile, pixels, overviews)?;
        writer.flush()?;
    }

    scratch
        .persist(path)
        .map_err(|e| MosaicError::OutputOpen(format!("{}: {}", path.display(), e.error)))?;

    info!(
        path = %path.display(),
        width = profile.width,
        height = profile.height,
        big = profile.big,
        overviews = overviews.len(),
        "Wrote GeoTIFF"
    );
    Ok(())
}

/// Encode the raster into any seekable writer.
pub fn write_to<W: Write + Seek>(
    writer: W,
    profile: &OutputProfile,
    pixels: &RasterBlock,
    overviews: &[(usize, RasterBlock)],
) -> Result<()> {
    if pixels.width != profile.width || pixels.height != profile.height {
        return Err(MosaicError::Encode(format!(
            "pixel block {}x{} does not match profile {}x{}",
            pixels.width, pixels.height, profile.width, profile.height
        )));
    }

    let compression = match profile.compression {
        OutputCompression::Deflate => Compression::Deflate(DeflateLevel::Fast),
    };

    if profile.big {
        let mut encoder = TiffEncoder::new_big(writer)?.with_compression(compression);
        write_ifds(&mut encoder, profile, pixels, overviews)
    } else {
        let mut encoder = TiffEncoder::new(writer)?.with_compression(compression);
        write_ifds(&mut encoder, profile, pixels, overviews)
    }
}

fn write_ifds<W: Write + Seek, K: TiffKind>(
    encoder: &mut TiffEncoder<W, K>,
    profile: &OutputProfile,
    pixels: &RasterBlock,
    overviews: &[(usize, RasterBlock)],
) -> Result<()> {
    write_image(encoder, profile, pixels, &profile.transform, false)?;

    for (factor, block) in overviews {
        let transform = profile.transform.scaled(*factor as f64);
        debug!(factor = factor, width = block.width, height = block.height, "Writing overview IFD");
        write_image(encoder, profile, block, &transform, true)?;
    }
    Ok(())
}

fn write_image<W: Write + Seek, K: TiffKind>(
    encoder: &mut TiffEncoder<W, K>,
    profile: &OutputProfile,
    block: &RasterBlock,
    transform: &PixelTransform,
    overview: bool,
) -> Result<()> {
    let image = Image {
        profile,
        block,
        transform,
        overview,
    };

    match profile.dtype {
        DataType::UInt8 => image.encode::<_, _, Gray8>(encoder, |v| v.round().clamp(0.0, 255.0) as u8),
        DataType::Int16 => image.encode::<_, _, GrayI16>(encoder, |v| {
            v.round().clamp(i16::MIN as f64, i16::MAX as f64) as i16
        }),
        DataType::UInt16 => image.encode::<_, _, Gray16>(encoder, |v| {
            v.round().clamp(0.0, u16::MAX as f64) as u16
        }),
        DataType::Int32 => image.encode::<_, _, GrayI32>(encoder, |v| {
            v.round().clamp(i32::MIN as f64, i32::MAX as f64) as i32
        }),
        DataType::UInt32 => image.encode::<_, _, Gray32>(encoder, |v| {
            v.round().clamp(0.0, u32::MAX as f64) as u32
        }),
        DataType::Float32 => image.encode::<_, _, Gray32Float>(encoder, |v| v as f32),
        DataType::Float64 => image.encode::<_, _, Gray64Float>(encoder, |v| v),
    }
}

struct Image<'a> {
    profile: &'a OutputProfile,
    block: &'a RasterBlock,
    transform: &'a PixelTransform,
    overview: bool,
}

impl Image<'_> {
    fn encode<W, K, C>(
        &self,
        encoder: &mut TiffEncoder<W, K>,
        convert: impl Fn(f64) -> C::Inner,
    ) -> Result<()>
    where
        W: Write + Seek,
        K: TiffKind,
        C: ColorType,
        [C::Inner]: tiff::encoder::TiffValue,
    {
        let data: Vec<C::Inner> = self.block.data.iter().map(|v| convert(*v)).collect();

        let mut image = encoder.new_image::<C>(self.block.width as u32, self.block.height as u32)?;
        let rows = self.profile.block_size.1.min(self.block.height).max(1);
        image.rows_per_strip(rows as u32)?;
        self.write_tags(image.encoder())?;
        image.write_data(&data)?;
        Ok(())
    }

    fn write_tags<W: Write + Seek, K: TiffKind>(
        &self,
        dir: &mut tiff::encoder::DirectoryEncoder<W, K>,
    ) -> TiffResult<()> {
        if self.overview {
            dir.write_tag(Tag::NewSubfileType, SUBFILE_REDUCED_IMAGE)?;
        }

        // ModelPixelScale: [ScaleX, ScaleY, ScaleZ]
        let pixel_scale = [
            self.transform.pixel_width.abs(),
            self.transform.pixel_height.abs(),
            0.0,
        ];
        dir.write_tag(Tag::Unknown(GEOTIFF_MODELPIXELSCALE), pixel_scale.as_slice())?;

        // ModelTiepoint: pixel (0, 0) at the upper-left corner
        let tiepoint = [
            0.0,
            0.0,
            0.0,
            self.transform.origin_x,
            self.transform.origin_y,
            0.0,
        ];
        dir.write_tag(Tag::Unknown(GEOTIFF_MODELTIEPOINT), tiepoint.as_slice())?;

        let geokeys = geokey_directory(self.profile.crs.epsg);
        dir.write_tag(Tag::Unknown(GEOTIFF_GEOKEYDIRECTORY), geokeys.as_slice())?;

        let nodata = format_nodata(self.profile.nodata);
        dir.write_tag(Tag::Unknown(GDAL_NODATA), nodata.as_str())?;
        Ok(())
    }
}

/// GeoKeyDirectory for a projected CRS identified by EPSG code.
fn geokey_directory(epsg: u32) -> Vec<u16> {
    let code = u16::try_from(epsg).unwrap_or(USER_DEFINED);
    vec![
        1, // KeyDirectoryVersion
        1, // KeyRevision
        0, // MinorRevision
        3, // NumberOfKeys
        GT_MODEL_TYPE_GEO_KEY,
        0,
        1,
        MODEL_TYPE_PROJECTED,
        GT_RASTER_TYPE_GEO_KEY,
        0,
        1,
        RASTER_PIXEL_IS_AREA,
        PROJECTED_CS_TYPE_GEO_KEY,
        0,
        1,
        code,
    ]
}

fn format_nodata(nodata: f64) -> String {
    if nodata.is_nan() {
        "nan".to_string()
    } else if nodata.fract() == 0.0 && nodata.abs() < 1e15 {
        format!("{}", nodata as i64)
    } else {
        format!("{}", nodata)
    }
}
