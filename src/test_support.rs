use miniz_oxide::deflate::compress_to_vec_zlib;

use crate::png::PNG_SIGNATURE;

/// length + type + data + CRC, with a real CRC so image decoders accept it.
pub fn raw_chunk(kind: &[u8; 4], data: &[u8]) -> Vec<u8> {
    let mut out = Vec::with_capacity(data.len() + 12);
    out.extend((data.len() as u32).to_be_bytes());
    out.extend(kind);
    out.extend(data);
    let mut hasher = crc32fast::Hasher::new();
    hasher.update(kind);
    hasher.update(data);
    out.extend(hasher.finalize().to_be_bytes());
    out
}

pub fn text_chunk(keyword: &str, text: &str) -> Vec<u8> {
    let mut data = keyword.as_bytes().to_vec();
    data.push(0);
    data.extend(text.as_bytes());
    raw_chunk(b"tEXt", &data)
}

pub fn ztxt_chunk(keyword: &str, text: &str) -> Vec<u8> {
    let mut data = keyword.as_bytes().to_vec();
    data.extend([0, 0]);
    data.extend(compress_to_vec_zlib(text.as_bytes(), 6));
    raw_chunk(b"zTXt", &data)
}

/// A valid 1x1 RGB PNG with `extra` chunks spliced in right after IHDR.
pub fn png_file(extra: &[Vec<u8>]) -> Vec<u8> {
    let mut buf = Vec::new();
    {
        let mut encoder = ::png::Encoder::new(&mut buf, 1, 1);
        encoder.set_color(::png::ColorType::Rgb);
        encoder.set_depth(::png::BitDepth::Eight);
        let mut writer = encoder.write_header().unwrap();
        writer.write_image_data(&[0, 0, 0]).unwrap();
        writer.finish().unwrap();
    }
    // signature (8) + IHDR (4 + 4 + 13 + 4)
    let after_ihdr = PNG_SIGNATURE.len() + 25;
    let tail = buf.split_off(after_ihdr);
    for chunk in extra {
        buf.extend(chunk);
    }
    buf.extend(tail);
    buf
}
