use image::{imageops::FilterType, DynamicImage, GrayImage, ImageBuffer, Luma, Primitive};
use imageproc::{definitions::Image, filter::filter_clamped, kernel::Kernel};
use ndarray::prelude::*;

/// Convert a frame to greyscale and resize it to exactly `width`x`height`.
pub fn grey_resized(frame: &DynamicImage, width: u32, height: u32, filter: FilterType) -> GrayImage {
    let grey = frame.to_luma8();
    if grey.dimensions() == (width, height) {
        grey
    } else {
        image::imageops::resize(&grey, width, height, filter)
    }
}

/// Copy a greyscale image into a (row, col) matrix.
pub fn to_matrix<S>(frame: &Image<Luma<S>>) -> Array2<f64>
where
    S: Primitive + Into<f64>,
{
    let (width, height) = frame.dimensions();
    Array2::from_shape_fn((height as usize, width as usize), |(y, x)| {
        frame.get_pixel(x as u32, y as u32).0[0].into()
    })
}

/// Widen an 8 bit greyscale image to floating point, so that filters over it do not
/// round their output back to whole intensities.
pub fn to_luma_f32(frame: &GrayImage) -> Image<Luma<f32>> {
    ImageBuffer::from_fn(frame.width(), frame.height(), |x, y| {
        Luma([f32::from(frame.get_pixel(x, y).0[0])])
    })
}

/// Gaussian blur of a greyscale image, with replicated borders.
pub fn gaussian_blur(frame: &GrayImage, sigma: f32) -> Array2<f64> {
    to_matrix(&imageproc::filter::gaussian_blur_f32(&to_luma_f32(frame), sigma))
}

/// 2D correlation of a greyscale image with a row-major `side`x`side` kernel, with
/// replicated borders.
pub fn filter_2d(frame: &GrayImage, kernel: &[f32], side: u32) -> Array2<f64> {
    let response: Image<Luma<f32>> = filter_clamped(frame, Kernel::new(kernel, side, side));
    to_matrix(&response)
}

/// Median of a set of values (mean of the two middle values for even lengths).
pub fn median(values: &[f64]) -> f64 {
    if values.is_empty() {
        return 0.0;
    }
    let mut sorted = values.to_vec();
    sorted.sort_by(f64::total_cmp);
    let mid = sorted.len() / 2;
    if sorted.len() % 2 == 0 {
        (sorted[mid - 1] + sorted[mid]) / 2.0
    } else {
        sorted[mid]
    }
}
