//! Raw little-endian raster blobs.

use bytes::{BufMut, Bytes, BytesMut};
use ndarray::{Array2, ArrayView2};

use crate::error::{CubeError, CubeResult};
use crate::types::DType;

/// Encode a raster row-major in the given storage type. Values are cast
/// with Rust `as` semantics (saturating, NaN to zero for integers).
pub fn encode_raster(values: ArrayView2<f32>, dtype: DType) -> Bytes {
    let mut buf = BytesMut::with_capacity(values.len() * dtype.itemsize());
    for &v in values.iter() {
        match dtype {
            DType::Int8 => buf.put_i8(v as i8),
            DType::UInt8 => buf.put_u8(v as u8),
            DType::Int16 => buf.put_i16_le(v as i16),
            DType::UInt16 => buf.put_u16_le(v as u16),
            DType::Int32 => buf.put_i32_le(v as i32),
            DType::UInt32 => buf.put_u32_le(v as u32),
            DType::Float32 => buf.put_f32_le(v),
            DType::Float64 => buf.put_f64_le(v as f64),
        }
    }
    buf.freeze()
}

/// Decode a row-major raster of `shape` (rows, cols).
pub fn decode_raster(bytes: &[u8], dtype: DType, shape: (usize, usize)) -> CubeResult<Array2<f32>> {
    let size = dtype.itemsize();
    let expected = shape.0 * shape.1 * size;
    if bytes.len() != expected {
        return Err(CubeError::ShapeMismatch(format!(
            "raster blob is {} bytes, expected {} for {:?} {}",
            bytes.len(),
            expected,
            shape,
            dtype
        )));
    }

    let values: Vec<f32> = bytes
        .chunks_exact(size)
        .map(|c| match dtype {
            DType::Int8 => c[0] as i8 as f32,
            DType::UInt8 => c[0] as f32,
            DType::Int16 => i16::from_le_bytes([c[0], c[1]]) as f32,
            DType::UInt16 => u16::from_le_bytes([c[0], c[1]]) as f32,
            DType::Int32 => i32::from_le_bytes([c[0], c[1], c[2], c[3]]) as f32,
            DType::UInt32 => u32::from_le_bytes([c[0], c[1], c[2], c[3]]) as f32,
            DType::Float32 => f32::from_le_bytes([c[0], c[1], c[2], c[3]]),
            DType::Float64 => {
                f64::from_le_bytes([c[0], c[1], c[2], c[3], c[4], c[5], c[6], c[7]]) as f32
            }
        })
        .collect();

    Ok(Array2::from_shape_vec(shape, values)?)
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::array;

    #[test]
    fn test_int16_layout() {
        let raster = array![[-999.0_f32, 1.0], [256.0, 0.0]];
        let bytes = encode_raster(raster.view(), DType::Int16);
        assert_eq!(&bytes[..4], &[0x19, 0xfc, 0x01, 0x00]);
        assert_eq!(decode_raster(&bytes, DType::Int16, (2, 2)).unwrap(), raster);
    }

    #[test]
    fn test_wrong_length_is_rejected() {
        let err = decode_raster(&[0u8; 3], DType::UInt8, (2, 2)).unwrap_err();
        assert!(matches!(err, CubeError::ShapeMismatch(_)));
    }
}
