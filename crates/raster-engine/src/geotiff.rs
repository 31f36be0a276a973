//! Single-band GeoTIFF reading and writing.
//!
//! Reads go through strips or tiles, so only the chunks a window touches
//! are decoded. Writes are LZW-compressed, optionally BigTIFF, with
//! nearest-neighbour overviews stored as reduced-resolution IFDs, and land
//! on disk atomically through a temporary file in the target directory.

use crate::error::{EngineError, Result};
use crate::geokeys::{self, GEO_DOUBLE_PARAMS_TAG};
use crate::overview::{generate_overviews, OverviewLevel};
use crate::raster::{GeoTransform, Raster, RasterGrid};
use crate::window::RasterWindow;
use scenario_common::Color;
use std::collections::HashMap;
use std::fs::File;
use std::io::{BufReader, BufWriter, Seek, Write};
use std::path::Path;
use tiff::decoder::{Decoder, DecodingResult};
use tiff::encoder::{colortype, compression::Lzw, TiffEncoder, TiffKind};
use tiff::tags::Tag;
use tiff::ColorType;
use tracing::debug;

const MODEL_PIXEL_SCALE: u16 = 33550;
const MODEL_TIEPOINT: u16 = 33922;
const GEO_KEY_DIRECTORY: u16 = 34735;
const GDAL_NODATA: u16 = 42113;

fn tag(code: u16) -> Tag {
    Tag::from_u16_exhaustive(code)
}

/// Options for writing LULC rasters.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct WriteOptions {
    pub bigtiff: bool,
    /// Rows per strip.
    pub block_size: usize,
    /// Build overviews down to this size; `None` writes no overviews.
    pub overview_min_dimension: Option<usize>,
}

impl Default for WriteOptions {
    fn default() -> Self {
        Self {
            bigtiff: true,
            block_size: 256,
            overview_min_dimension: None,
        }
    }
}

/// Header-level description of a GeoTIFF.
#[derive(Debug, Clone, PartialEq)]
pub struct RasterInfo {
    pub grid: RasterGrid,
    pub nodata: Option<u16>,
    pub bits_per_sample: u8,
}

/// Windowed reader over the first image of a GeoTIFF.
pub struct GeoTiffReader {
    decoder: Decoder<BufReader<File>>,
    info: RasterInfo,
    chunk_width: usize,
    chunk_height: usize,
    chunks_across: usize,
    cache: HashMap<u32, (usize, Vec<u16>)>,
}

impl std::fmt::Debug for GeoTiffReader {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("GeoTiffReader")
            .field("info", &self.info)
            .field("chunk_width", &self.chunk_width)
            .field("chunk_height", &self.chunk_height)
            .finish_non_exhaustive()
    }
}

impl GeoTiffReader {
    /// Open a GeoTIFF and read its georeferencing.
    pub fn open(path: &Path) -> Result<Self> {
        let file = File::open(path)
            .map_err(|e| EngineError::io(format!("cannot open {}: {e}", path.display())))?;
        let mut decoder = Decoder::new(BufReader::new(file))?;
        let info = read_info(&mut decoder).map_err(|e| annotate(e, path))?;

        let (chunk_width, chunk_height) = decoder.chunk_dimensions();
        let chunk_width = chunk_width.max(1) as usize;
        let chunk_height = chunk_height.max(1) as usize;
        let chunks_across = info.grid.width.div_ceil(chunk_width);

        debug!(
            path = %path.display(),
            width = info.grid.width,
            height = info.grid.height,
            chunk_width,
            chunk_height,
            crs = %info.grid.spatial_ref,
            "opened GeoTIFF"
        );

        Ok(Self {
            decoder,
            info,
            chunk_width,
            chunk_height,
            chunks_across,
            cache: HashMap::new(),
        })
    }

    pub fn info(&self) -> &RasterInfo {
        &self.info
    }

    /// Read a window given in the raster's own pixel indices.
    ///
    /// Pixels outside the raster come back as nodata (or 0 without a
    /// sentinel); the result is georeferenced on the raster's lattice.
    pub fn read_window(&mut self, window: &RasterWindow) -> Result<Raster> {
        let grid = window.grid(&self.info.grid.transform, self.info.grid.spatial_ref);
        let fill = self.info.nodata.unwrap_or(0);
        let mut raster = Raster::filled(grid, fill, self.info.nodata);

        let Some(inside) = window.clip_to(
            &self.info.grid.transform,
            self.info.grid.width,
            self.info.grid.height,
        ) else {
            return Ok(raster);
        };

        let col_start = inside.col_offset as usize;
        let row_start = inside.row_offset as usize;
        let col_end = col_start + inside.n_columns;
        let row_end = row_start + inside.n_rows;
        let out_width = window.n_columns;

        let (chunk_width, chunk_height) = (self.chunk_width, self.chunk_height);
        for chunk_row in row_start / chunk_height..=(row_end - 1) / chunk_height {
            for chunk_col in col_start / chunk_width..=(col_end - 1) / chunk_width {
                let index = (chunk_row * self.chunks_across + chunk_col) as u32;
                let (stride, chunk) = self.chunk(index)?;

                let y0 = (chunk_row * chunk_height).max(row_start);
                let y1 = ((chunk_row + 1) * chunk_height).min(row_end);
                let x0 = (chunk_col * chunk_width).max(col_start);
                let x1 = ((chunk_col + 1) * chunk_width).min(col_end);
                let len = x1 - x0;

                for y in y0..y1 {
                    let src_start = (y - chunk_row * chunk_height) * stride + (x0 - chunk_col * chunk_width);
                    let dst_row = (y as i64 - window.row_offset) as usize;
                    let dst_start = dst_row * out_width + (x0 as i64 - window.col_offset) as usize;
                    let src = chunk.get(src_start..src_start + len).ok_or_else(|| {
                        EngineError::raster_format(format!("chunk {index} is shorter than expected"))
                    })?;
                    raster.data_mut()[dst_start..dst_start + len].copy_from_slice(src);
                }
            }
        }

        Ok(raster)
    }

    /// Read the whole image.
    pub fn read_all(&mut self) -> Result<Raster> {
        let window = RasterWindow {
            min_x: 0.0,
            min_y: 0.0,
            max_x: 0.0,
            max_y: 0.0,
            n_columns: self.info.grid.width,
            n_rows: self.info.grid.height,
            col_offset: 0,
            row_offset: 0,
        };
        self.read_window(&window)
    }

    /// Palette entries from the TIFF ColorMap tag, if present.
    pub fn color_map(&mut self) -> Result<Option<Vec<Color>>> {
        let Some(value) = self.decoder.find_tag(Tag::ColorMap)? else {
            return Ok(None);
        };
        let map = value.into_u16_vec()?;
        let n = map.len() / 3;
        let colors = (0..n)
            .map(|i| Color::from_u16(map[i], map[n + i], map[2 * n + i]))
            .collect();
        Ok(Some(colors))
    }

    fn chunk(&mut self, index: u32) -> Result<(usize, &[u16])> {
        if !self.cache.contains_key(&index) {
            let (data_width, data_height) = self.decoder.chunk_data_dimensions(index);
            let values: Vec<u16> = match self.decoder.read_chunk(index)? {
                DecodingResult::U8(v) => v.into_iter().map(u16::from).collect(),
                DecodingResult::U16(v) => v,
                _ => {
                    return Err(EngineError::raster_format(
                        "only 8- and 16-bit unsigned rasters are supported",
                    ))
                }
            };
            // strips carry their true width, tiles are padded to the full chunk
            let stride = if values.len() == data_width as usize * data_height as usize {
                data_width as usize
            } else {
                self.chunk_width
            };
            self.cache.insert(index, (stride, values));
        }
        self.cache
            .get(&index)
            .map(|(stride, values)| (*stride, values.as_slice()))
            .ok_or_else(|| EngineError::raster_format(format!("chunk {index} missing")))
    }
}

fn annotate(err: EngineError, path: &Path) -> EngineError {
    match err {
        EngineError::RasterFormat(msg) => {
            EngineError::RasterFormat(format!("{}: {msg}", path.display()))
        }
        EngineError::Io(msg) => EngineError::Io(format!("{}: {msg}", path.display())),
        other => other,
    }
}

fn read_info<R: std::io::Read + Seek>(decoder: &mut Decoder<R>) -> Result<RasterInfo> {
    let (width, height) = decoder.dimensions()?;
    let bits_per_sample = match decoder.colortype()? {
        ColorType::Gray(bits) | ColorType::Palette(bits) if bits == 8 || bits == 16 => bits,
        other => {
            return Err(EngineError::raster_format(format!(
                "unsupported pixel layout {other:?}, expected one 8- or 16-bit band"
            )))
        }
    };

    let scale = decoder
        .find_tag(tag(MODEL_PIXEL_SCALE))?
        .ok_or_else(|| EngineError::raster_format("missing ModelPixelScale tag"))?
        .into_f64_vec()?;
    let tiepoint = decoder
        .find_tag(tag(MODEL_TIEPOINT))?
        .ok_or_else(|| EngineError::raster_format("missing ModelTiepoint tag"))?
        .into_f64_vec()?;
    if scale.len() < 2 || tiepoint.len() < 6 {
        return Err(EngineError::raster_format("malformed georeferencing tags"));
    }

    let transform = GeoTransform::new(
        tiepoint[3] - tiepoint[0] * scale[0],
        scale[0],
        tiepoint[4] + tiepoint[1] * scale[1],
        -scale[1],
    );

    let directory = decoder
        .find_tag(tag(GEO_KEY_DIRECTORY))?
        .ok_or_else(|| EngineError::raster_format("missing GeoKeyDirectory tag"))?
        .into_u16_vec()?;
    let doubles = match decoder.find_tag(tag(GEO_DOUBLE_PARAMS_TAG))? {
        Some(value) => value.into_f64_vec()?,
        None => Vec::new(),
    };
    let spatial_ref = geokeys::decode(&directory, &doubles)?;

    let nodata = match decoder.find_tag(tag(GDAL_NODATA))? {
        Some(value) => parse_nodata(&value.into_string()?),
        None => None,
    };

    Ok(RasterInfo {
        grid: RasterGrid::new(transform, width as usize, height as usize, spatial_ref),
        nodata,
        bits_per_sample,
    })
}

/// Parse a GDAL_NODATA string; values that do not fit `u16` mean no sentinel.
fn parse_nodata(text: &str) -> Option<u16> {
    let value: f64 = text.trim_matches(char::from(0)).trim().parse().ok()?;
    if value.fract() == 0.0 && (0.0..=f64::from(u16::MAX)).contains(&value) {
        Some(value as u16)
    } else {
        None
    }
}

/// Read only the header of a GeoTIFF.
pub fn read_info_from_path(path: &Path) -> Result<RasterInfo> {
    Ok(GeoTiffReader::open(path)?.info)
}

/// Read a whole GeoTIFF into memory.
pub fn read_raster(path: &Path) -> Result<Raster> {
    GeoTiffReader::open(path)?.read_all()
}

/// Write `raster` to `path` atomically.
///
/// The file is staged next to the target and renamed into place, so a
/// failure never leaves a partial file at `path`.
pub fn write_raster(path: &Path, raster: &Raster, options: &WriteOptions) -> Result<()> {
    let parent = match path.parent() {
        Some(p) if !p.as_os_str().is_empty() => p.to_path_buf(),
        _ => std::env::current_dir()?,
    };
    std::fs::create_dir_all(&parent)?;

    let mut staged = tempfile::Builder::new()
        .prefix(".lulc-")
        .suffix(".tif.partial")
        .tempfile_in(&parent)?;

    let overviews = match options.overview_min_dimension {
        Some(min_dimension) => generate_overviews(raster, min_dimension),
        None => Vec::new(),
    };

    {
        let mut writer = BufWriter::new(staged.as_file_mut());
        if options.bigtiff {
            encode(TiffEncoder::new_big(&mut writer)?, raster, &overviews, options)?;
        } else {
            encode(TiffEncoder::new(&mut writer)?, raster, &overviews, options)?;
        }
        writer.flush()?;
    }
    staged.as_file().sync_all()?;
    staged
        .persist(path)
        .map_err(|e| EngineError::io(format!("cannot move raster into {}: {}", path.display(), e.error)))?;

    debug!(
        path = %path.display(),
        width = raster.width(),
        height = raster.height(),
        overviews = overviews.len(),
        "wrote GeoTIFF"
    );
    Ok(())
}

fn encode<W: Write + Seek, K: TiffKind>(
    mut encoder: TiffEncoder<W, K>,
    raster: &Raster,
    overviews: &[OverviewLevel],
    options: &WriteOptions,
) -> Result<()> {
    let rows_per_strip = options.block_size.max(1) as u32;
    let grid = raster.grid();
    let (px, py) = grid.transform.pixel_size();
    let keys = geokeys::encode(&grid.spatial_ref);
    let nodata = raster.nodata().map(|v| v.to_string());

    {
        let mut image = encoder.new_image_with_compression::<colortype::Gray16, _>(
            raster.width() as u32,
            raster.height() as u32,
            Lzw::default(),
        )?;
        image.rows_per_strip(rows_per_strip)?;
        let dir = image.encoder();
        dir.write_tag(tag(MODEL_PIXEL_SCALE), &[px, py, 0.0][..])?;
        dir.write_tag(
            tag(MODEL_TIEPOINT),
            &[0.0, 0.0, 0.0, grid.transform.origin_x, grid.transform.origin_y, 0.0][..],
        )?;
        dir.write_tag(tag(GEO_KEY_DIRECTORY), &keys.directory[..])?;
        if !keys.doubles.is_empty() {
            dir.write_tag(tag(GEO_DOUBLE_PARAMS_TAG), &keys.doubles[..])?;
        }
        if let Some(nodata) = &nodata {
            dir.write_tag(tag(GDAL_NODATA), nodata.as_str())?;
        }
        image.write_data(raster.data())?;
    }

    for level in overviews {
        let mut image = encoder.new_image_with_compression::<colortype::Gray16, _>(
            level.width as u32,
            level.height as u32,
            Lzw::default(),
        )?;
        image.rows_per_strip(rows_per_strip)?;
        let dir = image.encoder();
        dir.write_tag(Tag::NewSubfileType, 1u32)?;
        if let Some(nodata) = &nodata {
            dir.write_tag(tag(GDAL_NODATA), nodata.as_str())?;
        }
        image.write_data(&level.data)?;
    }

    Ok(())
}

/// Number of reduced-resolution images following the main image.
pub fn count_overviews(path: &Path) -> Result<usize> {
    let file = File::open(path)?;
    let mut decoder = Decoder::new(BufReader::new(file))?;
    let mut count = 0;
    while decoder.more_images() {
        decoder.next_image()?;
        count += 1;
    }
    Ok(count)
}

#[cfg(test)]
mod tests {
    use super::*;
    use scenario_common::{AlbersEqualArea, CrsCode, Datum, SpatialReference};
    use test_utils::temp_test_dir_with_prefix;

    fn sample(width: usize, height: usize, spatial_ref: SpatialReference) -> Raster {
        let grid = RasterGrid::new(
            GeoTransform::new(-243_200.0, 30.0, 708_955.0, -30.0),
            width,
            height,
            spatial_ref,
        );
        let data = (0..width * height).map(|i| (i % 300) as u16).collect();
        Raster::from_data(grid, data, Some(u16::MAX)).unwrap()
    }

    #[test]
    fn test_roundtrip_preserves_pixels_and_georeference() {
        let dir = temp_test_dir_with_prefix("geotiff_");
        let path = dir.path().join("lulc.tif");
        let raster = sample(37, 23, CrsCode::Epsg5070.into());

        write_raster(&path, &raster, &WriteOptions::default()).unwrap();
        let back = read_raster(&path).unwrap();

        assert_eq!(back, raster);
        assert_eq!(back.nodata(), Some(u16::MAX));
    }

    #[test]
    fn test_standard_tiff_and_small_strips() {
        let dir = temp_test_dir_with_prefix("geotiff_");
        let path = dir.path().join("lulc.tif");
        let raster = sample(40, 35, CrsCode::Epsg3857.into());
        let options = WriteOptions {
            bigtiff: false,
            block_size: 16,
            overview_min_dimension: None,
        };

        write_raster(&path, &raster, &options).unwrap();
        assert_eq!(read_raster(&path).unwrap(), raster);
    }

    #[test]
    fn test_user_defined_albers_survives() {
        let dir = temp_test_dir_with_prefix("geotiff_");
        let path = dir.path().join("lulc.tif");
        let sr = SpatialReference::Albers(AlbersEqualArea {
            datum: Datum::Wgs84,
            ..AlbersEqualArea::conus()
        });
        write_raster(&path, &sample(4, 4, sr), &WriteOptions::default()).unwrap();

        let info = read_info_from_path(&path).unwrap();
        assert_eq!(info.grid.spatial_ref, sr);
        assert_eq!(info.bits_per_sample, 16);
    }

    #[test]
    fn test_read_window_pads_outside_with_nodata() {
        let dir = temp_test_dir_with_prefix("geotiff_");
        let path = dir.path().join("lulc.tif");
        let raster = sample(10, 10, CrsCode::Epsg5070.into());
        let options = WriteOptions {
            block_size: 16,
            ..Default::default()
        };
        write_raster(&path, &raster, &options).unwrap();

        let mut reader = GeoTiffReader::open(&path).unwrap();
        let window = RasterWindow {
            min_x: 0.0,
            min_y: 0.0,
            max_x: 0.0,
            max_y: 0.0,
            n_columns: 4,
            n_rows: 3,
            col_offset: -2,
            row_offset: 8,
        };
        let out = reader.read_window(&window).unwrap();
        assert_eq!(out.width(), 4);
        assert_eq!(out.get(0, 0), Some(u16::MAX));
        assert_eq!(out.get(2, 0), raster.get(0, 8));
        assert_eq!(out.get(3, 1), raster.get(1, 9));
        assert_eq!(out.get(2, 2), Some(u16::MAX));
        assert_eq!(out.grid().transform.origin_x, -243_200.0 - 60.0);
        assert_eq!(out.grid().transform.origin_y, 708_955.0 - 240.0);
    }

    #[test]
    fn test_overviews_written_as_extra_images() {
        let dir = temp_test_dir_with_prefix("geotiff_");
        let path = dir.path().join("lulc.tif");
        let raster = sample(64, 40, CrsCode::Epsg5070.into());
        let options = WriteOptions {
            overview_min_dimension: Some(8),
            ..Default::default()
        };
        write_raster(&path, &raster, &options).unwrap();

        // 32x20, 16x10 qualify; 8x5 falls below 8
        assert_eq!(count_overviews(&path).unwrap(), 2);
        assert_eq!(read_raster(&path).unwrap(), raster);
    }

    #[test]
    fn test_write_leaves_no_staging_file() {
        let dir = temp_test_dir_with_prefix("geotiff_");
        let path = dir.path().join("lulc.tif");
        let raster = sample(4, 4, CrsCode::Epsg5070.into());
        write_raster(&path, &raster, &WriteOptions::default()).unwrap();

        let staged: Vec<_> = std::fs::read_dir(dir.path())
            .unwrap()
            .filter_map(|e| e.ok())
            .filter(|e| e.file_name().to_string_lossy().ends_with(".partial"))
            .collect();
        assert!(staged.is_empty());
    }

    #[test]
    fn test_open_missing_file() {
        let err = GeoTiffReader::open(Path::new("/nonexistent/lulc.tif")).unwrap_err();
        assert!(matches!(err, EngineError::Io(_)));
    }

    #[test]
    fn test_parse_nodata() {
        assert_eq!(parse_nodata("65535"), Some(65535));
        assert_eq!(parse_nodata("0\0"), Some(0));
        assert_eq!(parse_nodata("-1"), None);
        assert_eq!(parse_nodata("nan"), None);
    }
}
