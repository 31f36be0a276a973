//! Common test fixtures for scenario tests.
//!
//! The San Antonio parcel is a 100 m buffer (64 vertices) drawn by the map
//! client in Web Mercator. Reprojected to CONUS Albers it spans roughly
//! 174 m, so on a 30 m NLCD-style grid its all-touched footprint depends on
//! the grid phase; the origins below pin the expected counts.

/// The parcel as drawn by the client.
pub mod parcel {
    /// Center of the parcel in EPSG:3857.
    pub const CENTER_3857: (f64, f64) = (-10_965_275.57, 3_429_693.30);

    /// Buffer radius in EPSG:3857 units.
    pub const RADIUS_3857: f64 = 100.0;

    /// Vertices on the buffer ring (4 × 16 quadrant segments).
    pub const SEGMENTS: usize = 64;

    /// Approximate center of the parcel in EPSG:5070.
    pub const CENTER_5070: (f64, f64) = (-242_876.46, 708_669.57);

    /// Approximate parcel envelope in EPSG:5070 (min_x, min_y, max_x, max_y).
    pub const BOUNDS_5070: (f64, f64, f64, f64) = (-242_963.6, 708_582.9, -242_789.3, 708_756.3);

    /// A square client-side pattern area north-west of the parcel.
    pub const PATTERN_CENTER_3857: (f64, f64) = (-10_965_475.0, 3_429_893.0);

    /// Half width of the pattern square in EPSG:3857 units.
    pub const PATTERN_HALF_WIDTH_3857: f64 = 60.0;
}

/// Grid geometry for 30 m NLCD-style rasters in EPSG:5070.
pub mod grid {
    /// NLCD pixel size in meters.
    pub const PIXEL_SIZE: f64 = 30.0;

    /// Reference-grid top-left corner on which the parcel touches 40 pixels.
    pub const ORIGIN_40_PX: (f64, f64) = (-245_900.0, 711_650.0);

    /// Reference-grid top-left corner on which the parcel touches 41 pixels.
    pub const ORIGIN_41_PX: (f64, f64) = (-245_900.0, 711_655.0);

    /// Top-left corner of the 20 × 20 tabulation source raster (41-pixel phase).
    pub const TABULATION_SOURCE_ORIGIN: (f64, f64) = (-243_200.0, 708_955.0);

    /// Side length of the tabulation source raster in pixels.
    pub const TABULATION_SOURCE_SIZE: usize = 20;

    /// Pixel (row, col) of the tabulation source that contains the parcel center.
    pub const TABULATION_CENTER_PIXEL: (usize, usize) = (9, 10);
}

/// Land-cover class codes used by the scenarios.
pub mod classes {
    /// Class burned by the fill scenario.
    pub const FILL_CLASS: u16 = 15;

    /// Background class of the tabulation source.
    pub const BASE_CLASS: u16 = 262;

    /// Class of the single pixel under the parcel center.
    pub const CENTER_CLASS: u16 = 321;

    /// Default nodata sentinel of LULC rasters.
    pub const NODATA: u16 = u16::MAX;
}

/// Common CRS identifiers.
pub mod crs {
    /// Web Mercator, the client CRS
    pub const EPSG_3857: &str = "EPSG:3857";

    /// CONUS Albers, the NLCD grid CRS
    pub const EPSG_5070: &str = "EPSG:5070";

    /// WGS84 geographic
    pub const EPSG_4326: &str = "EPSG:4326";
}
