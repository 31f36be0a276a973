//! Reduced-resolution overviews for categorical rasters.
//!
//! Each level halves the previous one, taking the top-left pixel of every
//! 2x2 block so class codes are never blended.

use crate::raster::Raster;

/// One overview image.
#[derive(Debug, Clone, PartialEq)]
pub struct OverviewLevel {
    pub data: Vec<u16>,
    pub width: usize,
    pub height: usize,
}

/// Halve a row-major grid, rounding odd dimensions down.
pub fn downsample_nearest(data: &[u16], width: usize, height: usize) -> (Vec<u16>, usize, usize) {
    let new_width = width / 2;
    let new_height = height / 2;
    if new_width == 0 || new_height == 0 {
        return (Vec::new(), 0, 0);
    }

    let mut output = Vec::with_capacity(new_width * new_height);
    for out_y in 0..new_height {
        let row = &data[out_y * 2 * width..];
        output.extend((0..new_width).map(|out_x| row[out_x * 2]));
    }
    (output, new_width, new_height)
}

/// Build overview levels until the next level's smaller side would fall
/// below `min_dimension`.
pub fn generate_overviews(raster: &Raster, min_dimension: usize) -> Vec<OverviewLevel> {
    let mut levels: Vec<OverviewLevel> = Vec::new();
    let mut width = raster.width();
    let mut height = raster.height();

    loop {
        let next_width = width / 2;
        let next_height = height / 2;
        if next_width == 0 || next_height == 0 || next_width.min(next_height) < min_dimension {
            break;
        }

        let source = levels.last().map_or(raster.data(), |level| level.data.as_slice());
        let (data, new_width, new_height) = downsample_nearest(source, width, height);
        levels.push(OverviewLevel {
            data,
            width: new_width,
            height: new_height,
        });
        width = new_width;
        height = new_height;
    }

    levels
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::raster::{GeoTransform, RasterGrid};
    use scenario_common::CrsCode;

    fn raster(width: usize, height: usize) -> Raster {
        let grid = RasterGrid::new(
            GeoTransform::new(0.0, 30.0, 0.0, -30.0),
            width,
            height,
            CrsCode::Epsg5070.into(),
        );
        let data = (0..width * height).map(|v| v as u16).collect();
        Raster::from_data(grid, data, None).unwrap()
    }

    #[test]
    fn test_downsample_takes_top_left() {
        let data: Vec<u16> = (1..=16).collect();
        let (out, w, h) = downsample_nearest(&data, 4, 4);
        assert_eq!((w, h), (2, 2));
        assert_eq!(out, vec![1, 3, 9, 11]);
    }

    #[test]
    fn test_downsample_odd_dimensions() {
        let data: Vec<u16> = (0..15).collect();
        let (out, w, h) = downsample_nearest(&data, 5, 3);
        assert_eq!((w, h), (2, 1));
        assert_eq!(out, vec![0, 2]);
    }

    #[test]
    fn test_downsample_too_small() {
        let (out, w, h) = downsample_nearest(&[7], 1, 1);
        assert!(out.is_empty());
        assert_eq!((w, h), (0, 0));
    }

    #[test]
    fn test_levels_stop_at_min_dimension() {
        let levels = generate_overviews(&raster(1024, 512), 128);
        let dims: Vec<_> = levels.iter().map(|l| (l.width, l.height)).collect();
        assert_eq!(dims, vec![(512, 256), (256, 128)]);
    }

    #[test]
    fn test_levels_chain_from_previous() {
        let levels = generate_overviews(&raster(8, 8), 1);
        assert_eq!(levels.len(), 3);
        // pixel (0,0) of every level is pixel (0,0) of the source
        assert!(levels.iter().all(|l| l.data[0] == 0));
        // level 1 (4x4) pixel (1,0) is source (2,0); level 2 pixel (1,0) is source (4,0)
        assert_eq!(levels[0].data[1], 2);
        assert_eq!(levels[1].data[1], 4);
    }

    #[test]
    fn test_no_levels_for_small_raster() {
        assert!(generate_overviews(&raster(100, 100), 256).is_empty());
    }
}
