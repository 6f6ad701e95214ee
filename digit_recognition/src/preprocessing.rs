use image::{imageops::FilterType, DynamicImage, GrayImage, ImageBuffer, Luma, Rgb, RgbaImage};
use ndarray::{Array, Ix4};
use serde::Deserialize;
use std::io::Cursor;
use thiserror::Error;

pub const MNIST_INPUT_SIZE: u32 = 28;

#[derive(Error, Debug)]
pub enum PreprocessError {
    #[error("No image or drawing to classify.")]
    Empty,
    #[error("Error decoding image: {0}")]
    Decode(#[from] image::ImageError),
    #[error("Error reading image: {0}")]
    Io(#[from] std::io::Error),
    #[error("Canvas buffer holds {actual} bytes, expected {expected} for {width}x{height} RGBA")]
    CanvasSize {
        width: u32,
        height: u32,
        expected: usize,
        actual: usize,
    },
    #[error("Invalid tensor shape: {0}")]
    Shape(#[from] ndarray::ShapeError),
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TensorLayout {
    #[default]
    Nhwc,
    Nchw,
}

impl TensorLayout {
    pub fn shape(&self, size: u32) -> [usize; 4] {
        let size = size as usize;
        match self {
            TensorLayout::Nhwc => [1, size, size, 1],
            TensorLayout::Nchw => [1, 1, size, size],
        }
    }
}

/// Raw RGBA pixels as exported by a drawing canvas.
#[derive(Debug, Clone)]
pub struct CanvasImage {
    pub width: u32,
    pub height: u32,
    pub rgba: Vec<u8>,
}

impl CanvasImage {
    fn into_rgba_image(self) -> Result<RgbaImage, PreprocessError> {
        if self.rgba.is_empty() {
            return Err(PreprocessError::Empty);
        }
        let (width, height, actual) = (self.width, self.height, self.rgba.len());
        let expected = (width as usize)
            .checked_mul(height as usize)
            .and_then(|n| n.checked_mul(4))
            .unwrap_or(usize::MAX);
        if expected == 0 || actual != expected {
            return Err(PreprocessError::CanvasSize {
                width,
                height,
                expected,
                actual,
            });
        }

        ImageBuffer::from_raw(width, height, self.rgba).ok_or(PreprocessError::CanvasSize {
            width,
            height,
            expected,
            actual,
        })
    }
}

#[derive(Debug, Clone)]
pub struct DigitTensor {
    pub input: Array<f32, Ix4>,
    pub preview: GrayImage,
}

#[derive(Debug, Clone, Copy)]
pub struct Preprocessor {
    pub input_size: u32,
    pub layout: TensorLayout,
}

impl Default for Preprocessor {
    fn default() -> Self {
        Self {
            input_size: MNIST_INPUT_SIZE,
            layout: TensorLayout::default(),
        }
    }
}

impl Preprocessor {
    pub fn new(input_size: u32, layout: TensorLayout) -> Self {
        Self { input_size, layout }
    }

    pub fn preprocess_upload(&self, image_data: &[u8]) -> Result<DigitTensor, PreprocessError> {
        if image_data.is_empty() {
            return Err(PreprocessError::Empty);
        }

        let original_img = image::ImageReader::new(Cursor::new(image_data))
            .with_guessed_format()?
            .decode()?;

        tracing::debug!(
            width = original_img.width(),
            height = original_img.height(),
            "Decoded uploaded image"
        );

        // Grayscale first, then resize.
        let gray = to_luma(&original_img);
        let resized = image::imageops::resize(
            &gray,
            self.input_size,
            self.input_size,
            FilterType::Triangle,
        );

        self.to_tensor(resized)
    }

    pub fn preprocess_canvas(&self, canvas: CanvasImage) -> Result<DigitTensor, PreprocessError> {
        let rgba = canvas.into_rgba_image()?;

        // The canvas path resizes the colour image before dropping to grayscale.
        let resized = image::imageops::resize(
            &rgba,
            self.input_size,
            self.input_size,
            FilterType::Triangle,
        );
        let gray = to_luma(&DynamicImage::ImageRgba8(resized));

        self.to_tensor(gray)
    }

    fn to_tensor(&self, gray: GrayImage) -> Result<DigitTensor, PreprocessError> {
        let values: Vec<f32> = gray.as_raw().iter().map(|&v| v as f32 / 255.).collect();
        let input = Array::from_shape_vec(self.layout.shape(self.input_size), values)?;

        Ok(DigitTensor {
            input,
            preview: gray,
        })
    }
}

/// ITU-R 601-2 luma, matching PIL's `convert("L")`. Alpha is dropped.
pub fn to_luma(img: &DynamicImage) -> GrayImage {
    let rgb = img.to_rgb8();
    let mut gray = GrayImage::new(rgb.width(), rgb.height());
    for (x, y, Rgb([r, g, b])) in rgb.enumerate_pixels() {
        let l = (*r as u32 * 19595 + *g as u32 * 38470 + *b as u32 * 7471 + 0x8000) >> 16;
        gray.put_pixel(x, y, Luma([l as u8]));
    }
    gray
}

pub fn encode_preview(preview: &GrayImage) -> Result<Vec<u8>, PreprocessError> {
    let mut buffer = Cursor::new(Vec::new());
    preview.write_to(&mut buffer, image::ImageFormat::Png)?;
    Ok(buffer.into_inner())
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::{ImageBuffer, Rgba};

    fn encode(img: DynamicImage, format: image::ImageFormat) -> Vec<u8> {
        let mut cursor = Cursor::new(Vec::new());
        img.write_to(&mut cursor, format).unwrap();
        cursor.into_inner()
    }

    #[test]
    fn test_preprocess_upload_png() {
        let img = ImageBuffer::<Rgb<u8>, Vec<u8>>::from_pixel(100, 60, Rgb([255, 255, 255]));
        let image_data = encode(DynamicImage::ImageRgb8(img), image::ImageFormat::Png);

        let tensor = Preprocessor::default()
            .preprocess_upload(&image_data)
            .unwrap();

        assert_eq!(tensor.input.shape(), &[1, 28, 28, 1]);
        assert_eq!(tensor.preview.dimensions(), (28, 28));
        assert!(tensor.input.iter().all(|v| (*v - 1.0).abs() < 1e-6));
    }

    #[test]
    fn test_preprocess_upload_jpeg_is_normalized() {
        let img = ImageBuffer::<Rgb<u8>, Vec<u8>>::from_pixel(64, 64, Rgb([128, 128, 128]));
        let image_data = encode(DynamicImage::ImageRgb8(img), image::ImageFormat::Jpeg);

        let tensor = Preprocessor::default()
            .preprocess_upload(&image_data)
            .unwrap();

        assert!(tensor.input.iter().all(|v| (0.0..=1.0).contains(v)));
        let first = tensor.input[[0, 14, 14, 0]];
        assert!((first - 128. / 255.).abs() < 0.05);
    }

    #[test]
    fn test_preprocess_upload_nchw_layout() {
        let img = ImageBuffer::<Luma<u8>, Vec<u8>>::from_pixel(28, 28, Luma([0]));
        let image_data = encode(DynamicImage::ImageLuma8(img), image::ImageFormat::Png);

        let tensor = Preprocessor::new(28, TensorLayout::Nchw)
            .preprocess_upload(&image_data)
            .unwrap();

        assert_eq!(tensor.input.shape(), &[1, 1, 28, 28]);
    }

    #[test]
    fn test_preprocess_upload_rejects_empty_and_garbage() {
        let preprocessor = Preprocessor::default();

        assert!(matches!(
            preprocessor.preprocess_upload(&[]),
            Err(PreprocessError::Empty)
        ));
        assert!(matches!(
            preprocessor.preprocess_upload(b"definitely not an image"),
            Err(PreprocessError::Decode(_))
        ));
    }

    #[test]
    fn test_luma_weights() {
        let mut img = ImageBuffer::<Rgb<u8>, Vec<u8>>::new(3, 1);
        img.put_pixel(0, 0, Rgb([255, 0, 0]));
        img.put_pixel(1, 0, Rgb([0, 255, 0]));
        img.put_pixel(2, 0, Rgb([0, 0, 255]));

        let gray = to_luma(&DynamicImage::ImageRgb8(img));

        assert_eq!(gray.get_pixel(0, 0).0, [76]);
        assert_eq!(gray.get_pixel(1, 0).0, [150]);
        assert_eq!(gray.get_pixel(2, 0).0, [29]);
    }

    #[test]
    fn test_preprocess_canvas_stroke() {
        let size = 256;
        let mut canvas = ImageBuffer::from_pixel(size, size, Rgba([0u8, 0, 0, 255]));
        for y in 0..size {
            for x in 124..132 {
                canvas.put_pixel(x, y, Rgba([255, 255, 255, 255]));
            }
        }

        let tensor = Preprocessor::default()
            .preprocess_canvas(CanvasImage {
                width: size,
                height: size,
                rgba: canvas.into_raw(),
            })
            .unwrap();

        assert_eq!(tensor.input.shape(), &[1, 28, 28, 1]);
        assert!(tensor.input[[0, 14, 13, 0]] > 0.2);
        assert!(tensor.input[[0, 14, 14, 0]] > 0.2);
        assert_eq!(tensor.input[[0, 14, 0, 0]], 0.0);
        assert_eq!(tensor.input[[0, 14, 27, 0]], 0.0);
    }

    #[test]
    fn test_blank_canvas_is_still_a_tensor() {
        let tensor = Preprocessor::default()
            .preprocess_canvas(CanvasImage {
                width: 256,
                height: 256,
                rgba: vec![0; 256 * 256 * 4],
            })
            .unwrap();

        assert!(tensor.input.iter().all(|v| *v == 0.0));
    }

    #[test]
    fn test_preprocess_canvas_size_mismatch() {
        let result = Preprocessor::default().preprocess_canvas(CanvasImage {
            width: 256,
            height: 256,
            rgba: vec![0; 100],
        });

        assert!(matches!(
            result,
            Err(PreprocessError::CanvasSize {
                expected: 262144,
                actual: 100,
                ..
            })
        ));

        let empty = Preprocessor::default().preprocess_canvas(CanvasImage {
            width: 256,
            height: 256,
            rgba: Vec::new(),
        });
        assert!(matches!(empty, Err(PreprocessError::Empty)));
    }

    #[test]
    fn test_preprocess_canvas_huge_dimensions() {
        let result = Preprocessor::default().preprocess_canvas(CanvasImage {
            width: u32::MAX,
            height: u32::MAX,
            rgba: vec![0; 16],
        });

        assert!(matches!(
            result,
            Err(PreprocessError::CanvasSize { actual: 16, .. })
        ));
    }

    #[test]
    fn test_encode_preview_png() {
        let preview = GrayImage::from_pixel(28, 28, Luma([200]));
        let png = encode_preview(&preview).unwrap();

        assert_eq!(&png[..8], b"\x89PNG\r\n\x1a\n");
        let decoded = image::load_from_memory(&png).unwrap();
        assert_eq!(decoded.width(), 28);
    }
}
