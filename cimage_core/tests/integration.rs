//! Integration tests: channels and images built, edited and read back through
//! the public API only.
//!
//! Covers the round-trip guarantee for every element type, lazy channels,
//! chunk replacement, image geometry rules, and ingestion from both the
//! in-memory source and a raw planar file on disk.

use std::io::Write;

use cimage_core::dtype::as_bytes;
use cimage_core::{
    f16, Channel, ChannelOptions, ChannelSelection, Codec, Element, ElementType, Error, Image,
    MemoryImage, MemoryOpener, RawPlanarLayout, RawPlanarOpener, SharedChannel,
};

/// Generate `len` deterministic values in `0..256` using a simple LCG.
fn pseudo_random(len: usize, seed: u64) -> Vec<f64> {
    let mut rng = seed;
    (0..len)
        .map(|_| {
            rng = rng
                .wrapping_mul(6364136223846793005)
                .wrapping_add(1442695040888963407);
            (rng >> 56) as f64
        })
        .collect()
}

/// A smooth gradient, the kind of content real images compress well on.
fn gradient<T: Element>(width: usize, height: usize) -> Vec<T> {
    (0..width * height)
        .map(|i| T::from_f64(((i % width) + (i / width)) as f64 % 200.0))
        .collect()
}

fn rgba_source(width: usize, height: usize) -> MemoryOpener {
    let mut image = MemoryImage::new(width, height).with_metadata("software", "tests");
    for (seed, name) in ["R", "G", "B", "A"].into_iter().enumerate() {
        let plane = pseudo_random(width * height, seed as u64 + 1)
            .into_iter()
            .map(|v| v as f32)
            .collect();
        image = image.with_channel(name, plane).unwrap();
    }
    MemoryOpener::new(vec![image])
}

// ── channels ───────────────────────────────────────────────────────────────

#[test]
fn test_roundtrip_all_types_and_codecs() {
    fn check<T: Element>() {
        for (width, height) in [(1, 1), (13, 7), (64, 64), (300, 41)] {
            let data = gradient::<T>(width, height);
            for codec in Codec::ALL {
                let options = ChannelOptions::builder().codec(codec).level(5).build();
                let channel = Channel::from_array(&data, width, height, options).unwrap();
                assert_eq!(
                    channel.get_decompressed::<T>().unwrap(),
                    data,
                    "{} {}x{} {}",
                    T::DTYPE,
                    width,
                    height,
                    codec
                );
            }
        }
    }
    check::<u8>();
    check::<i8>();
    check::<u16>();
    check::<i16>();
    check::<u32>();
    check::<i32>();
    check::<f16>();
    check::<f32>();
}

#[test]
fn test_chunk_per_row() {
    let data = gradient::<u16>(64, 64);
    let options = ChannelOptions::builder().chunk_size(64 * 2).build();
    let channel = Channel::from_array(&data, 64, 64, options).unwrap();
    assert_eq!(channel.num_chunks(), 64);
    assert_eq!(channel.uncompressed_size(), 64 * 64);
}

#[test]
fn test_large_channel_compresses_and_reads_back() {
    let (width, height) = (1024, 700);
    let data = gradient::<u16>(width, height);
    let options = ChannelOptions::builder()
        .codec(Codec::Zstd)
        .chunk_size(width * 2 * 128)
        .block_size(16 * 1024)
        .build();
    let channel = Channel::from_array(&data, width, height, options).unwrap();
    assert_eq!(channel.num_chunks(), 6);
    assert_eq!(channel.chunk_rows(5).unwrap(), 700 - 5 * 128);
    assert!(channel.compression_ratio() > 4.0, "ratio {}", channel.compression_ratio());
    assert_eq!(channel.get_rows::<u16>(120..260).unwrap(), data[120 * width..260 * width]);
}

#[test]
fn test_zeros_and_full_materialize() {
    for dtype in ElementType::ALL {
        let zeros = Channel::zeros(dtype, 37, 11, ChannelOptions::default()).unwrap();
        assert!(zeros.get_decompressed_bytes().unwrap().iter().all(|&b| b == 0), "{dtype}");
    }
    let full = Channel::full(ElementType::F16, 2.5f32, 8, 8, ChannelOptions::default()).unwrap();
    assert_eq!(full.get_decompressed::<f16>().unwrap(), vec![f16::from_f32(2.5); 64]);
    let full = Channel::full(ElementType::I8, -100i32, 8, 8, ChannelOptions::default()).unwrap();
    assert_eq!(full.get_decompressed::<i8>().unwrap(), vec![-100i8; 64]);
}

#[test]
fn test_huge_lazy_channel_stays_small() {
    let channel = Channel::zeros(ElementType::F32, 100_000, 100_000, ChannelOptions::default()).unwrap();
    assert_eq!(channel.num_lazy_chunks(), channel.num_chunks());
    assert!(channel.compressed_size() <= channel.num_chunks() * 4);
    assert_eq!(channel.get_chunk::<f32>(0).unwrap().len(), channel.chunk_elems());
}

#[test]
fn test_set_chunk_then_get_chunk() {
    let mut channel = Channel::zeros(ElementType::U8, 32, 32, ChannelOptions::builder().chunk_size(32 * 4).build())
        .unwrap();
    let block: Vec<u8> = (0..128).map(|i| i as u8).collect();
    for _ in 0..2 {
        channel.set_chunk(7, &block).unwrap();
        assert_eq!(channel.get_chunk::<u8>(7).unwrap(), block);
    }
    assert!(matches!(channel.set_chunk(7, &block[..127]), Err(Error::Shape { .. })));
    assert!(matches!(channel.set_chunk(8, &block), Err(Error::IndexOutOfRange { .. })));
    assert!(matches!(channel.get_chunk::<u8>(8), Err(Error::IndexOutOfRange { .. })));
}

#[test]
fn test_invalid_configuration() {
    let data = vec![0u16; 64];
    let level = ChannelOptions::builder().level(42).build();
    assert!(matches!(Channel::from_array(&data, 8, 8, level), Err(Error::InvalidConfig(_))));
    let misaligned = ChannelOptions::builder().chunk_size(15).build();
    assert!(matches!(Channel::from_array(&data, 8, 8, misaligned), Err(Error::InvalidConfig(_))));
    assert!(matches!(ElementType::from_name("bool"), Err(Error::InvalidType(_))));
}

// ── images ─────────────────────────────────────────────────────────────────

#[test]
fn test_four_channels_in_fresh_image() {
    let options = ChannelOptions::default();
    let mut image = Image::with_size(64, 64, &options).unwrap();
    let planes: Vec<Vec<u8>> = (0..4)
        .map(|seed| pseudo_random(64 * 64, seed).into_iter().map(|v| v as u8).collect())
        .collect();
    for (plane, name) in planes.iter().zip(["R", "G", "B", "A"]) {
        image.add_channel(plane, 64, 64, Some(name), &options).unwrap();
    }
    assert_eq!(image.num_channels(), 4);
    assert_eq!(image.shape(), (4, 64, 64));
    assert_eq!(image.get_decompressed::<u8>().unwrap(), planes);
}

#[test]
fn test_read_by_names_equals_read_by_indices() {
    let opener = rgba_source(48, 40);
    let options = ChannelOptions::builder().chunk_size(48 * 8).build();

    let by_index = Image::read(
        &opener,
        "memory",
        0,
        ElementType::U8,
        &ChannelSelection::Indices(vec![0, 1, 2, 3]),
        &options,
    )
    .unwrap();
    let by_name = Image::read(
        &opener,
        "memory",
        0,
        ElementType::U8,
        &ChannelSelection::names(&["R", "G", "B", "A"]),
        &options,
    )
    .unwrap();

    assert_eq!(by_index.channel_names(), by_name.channel_names());
    assert_eq!(
        by_index.get_decompressed::<u8>().unwrap(),
        by_name.get_decompressed::<u8>().unwrap()
    );
    assert_eq!(by_name.metadata()["software"], "tests");
    assert_eq!(by_name.channel("R").unwrap().num_chunks(), 5);
}

#[test]
fn test_read_preserves_request_order() {
    let opener = rgba_source(16, 16);
    let options = ChannelOptions::default();
    let all = Image::read(&opener, "memory", 0, ElementType::F32, &ChannelSelection::All, &options).unwrap();
    let picked = Image::read(
        &opener,
        "memory",
        0,
        ElementType::F32,
        &ChannelSelection::names(&["B", "R"]),
        &options,
    )
    .unwrap();
    assert_eq!(all.channel_names(), vec!["R", "G", "B", "A"]);
    assert_eq!(picked.channel_names(), vec!["B", "R"]);
    assert_eq!(
        picked.channel_at(0).unwrap().get_decompressed::<f32>().unwrap(),
        all.channel("B").unwrap().get_decompressed::<f32>().unwrap()
    );

    let unknown = ChannelSelection::names(&["Z"]);
    assert!(matches!(
        Image::read(&opener, "memory", 0, ElementType::F32, &unknown, &options),
        Err(Error::ChannelNotFound(_))
    ));
    let out_of_range = ChannelSelection::Indices(vec![4]);
    assert!(matches!(
        Image::read(&opener, "memory", 0, ElementType::F32, &out_of_range, &options),
        Err(Error::IndexOutOfRange { .. })
    ));
}

#[test]
fn test_channel_outlives_image() {
    let opener = rgba_source(32, 32);
    let expected = Image::read(&opener, "memory", 0, ElementType::U16, &ChannelSelection::All, &ChannelOptions::default())
        .unwrap()
        .channel("G")
        .unwrap()
        .get_decompressed::<u16>()
        .unwrap();

    let handle: SharedChannel = {
        let image = Image::read(
            &opener,
            "memory",
            0,
            ElementType::U16,
            &ChannelSelection::All,
            &ChannelOptions::default(),
        )
        .unwrap();
        image.channel("G").unwrap()
    };
    assert_eq!(handle.handle_count(), 1);
    assert_eq!(handle.get_decompressed::<u16>().unwrap(), expected);
}

#[test]
fn test_raw_planar_file_ingest() {
    let (width, height) = (40, 30);
    let planes: Vec<Vec<f32>> = (0..3)
        .map(|c| gradient::<f32>(width, height).into_iter().map(|v| v + c as f32).collect())
        .collect();
    let mut file = tempfile::NamedTempFile::new().unwrap();
    for plane in &planes {
        file.write_all(as_bytes(plane)).unwrap();
    }
    file.flush().unwrap();

    let opener = RawPlanarOpener::new(RawPlanarLayout {
        width,
        height,
        stored: ElementType::F32,
        channel_names: vec!["X".into(), "Y".into(), "Z".into()],
    });
    let options = ChannelOptions::builder()
        .codec(Codec::Lz4hc)
        .chunk_size(width * 4 * 7)
        .build();
    let image = Image::read(&opener, file.path(), 0, ElementType::F32, &ChannelSelection::All, &options).unwrap();

    assert_eq!(image.shape(), (3, 30, 40));
    assert_eq!(image.get_decompressed::<f32>().unwrap(), planes);
    assert_eq!(image.channel("Z").unwrap().num_chunks(), 5);
    assert!(image.statistics().to_string().contains("[X, Y, Z]"));
    assert!(matches!(
        Image::read(&opener, file.path(), 1, ElementType::F32, &ChannelSelection::All, &options),
        Err(Error::IndexOutOfRange { .. })
    ));
}

#[test]
fn test_read_with_postprocess_edits_rows_before_compression() {
    let opener = rgba_source(24, 20);
    let options = ChannelOptions::builder().chunk_size(24 * 2 * 6).build();
    let mut calls = vec![0usize; 3];
    let image = Image::read_with::<u16, _, _>(
        &opener,
        "memory",
        0,
        &ChannelSelection::names(&["A", "R", "B"]),
        &options,
        |channel, rows| {
            calls[channel] += 1;
            assert_eq!(rows.len() % 24, 0);
            rows.fill(25 + channel as u16);
        },
    )
    .unwrap();

    // 20 rows in chunks of 6 rows: four runs per channel.
    assert_eq!(calls, vec![4, 4, 4]);
    assert_eq!(image.channel_names(), vec!["A", "R", "B"]);
    for (position, plane) in image.get_decompressed::<u16>().unwrap().into_iter().enumerate() {
        assert_eq!(plane, vec![25 + position as u16; 24 * 20]);
    }
    assert_eq!(image.channel("R").unwrap().dtype(), ElementType::U16);
}

#[test]
fn test_read_metadata_without_pixels() {
    let opener = rgba_source(8, 8);
    let metadata = Image::read_metadata(&opener, "memory", 0).unwrap();
    assert_eq!(metadata["software"], "tests");
    assert!(matches!(
        Image::read_metadata(&opener, "memory", 3),
        Err(Error::IndexOutOfRange { .. })
    ));
}

#[test]
fn test_chunk_edits_through_image_handles_keep_geometry() {
    let options = ChannelOptions::builder().chunk_size(16 * 4).build();
    let mut image = Image::from_arrays(&[gradient::<u8>(16, 8).as_slice()], 16, 8, &["L"], &options).unwrap();
    let handle = image.channel("L").unwrap();
    handle.set_chunk_shaped(1, &[9u8; 64], &[4, 16]).unwrap();
    assert!(matches!(handle.set_chunk(1, &[9u8; 16]), Err(Error::Shape { .. })));

    let added = image
        .add_channel(&[1u8; 128], 16, 8, Some("M"), &ChannelOptions::builder().codec(Codec::Zstd).build())
        .unwrap();
    assert_eq!(added.num_chunks(), 2);
    assert_eq!(image.channel("L").unwrap().shape(), (image.height(), image.width()));
    assert_eq!(image.channel("L").unwrap().get_chunk::<u8>(1).unwrap(), vec![9u8; 64]);
}
