//! Write-then-read tests over the full extent of a grid, for every format.

use grdio::{
    Endianness, FormatError, FormatId, GridBuffer, GridError, GridHeader, GridIo, GridIoConfig,
    Pad, Window,
};

mod util;
use util::{cells, grid_file, pixel_header, ramp};

#[test]
fn test_native_float_is_exact() {
    let dir = tempfile::tempdir().unwrap();
    let io = GridIo::default();
    let header = GridHeader {
        title: "ramp".into(),
        z_units: "m".into(),
        ..pixel_header((0.0, 8.0), (-3.0, 3.0), 0.5)
    };
    let buffer = ramp(&header, Pad::default(), |c, r| c as f32 * 0.25 - r as f32 * 1.5);
    let file = grid_file(&dir, "ramp.grd");

    let report = io.write_full(&file, &header, &buffer).unwrap();
    assert_eq!(report.cells_written, 16 * 12);
    assert_eq!(report.clamped, 0);

    let back = io.read_header(&file).unwrap();
    assert_eq!((back.nx, back.ny), (16, 12));
    assert_eq!(
        (back.x_min, back.x_max, back.y_min, back.y_max),
        (0.0, 8.0, -3.0, 3.0)
    );
    assert_eq!(back.title, "ramp");
    assert_eq!(back.z_units, "m");
    assert_eq!(back.format, FormatId::NativeFloat);
    assert_eq!((back.z_min, back.z_max), (-16.5, 3.75));

    let read = io
        .read_grid(&file, &back, &Window::full(&back), Pad::default())
        .unwrap();
    assert_eq!(read.interior(), buffer.interior());
}

#[test]
fn test_quantized_formats_within_half_a_step() {
    let dir = tempfile::tempdir().unwrap();
    let io = GridIo::default();
    let header = pixel_header((0.0, 16.0), (0.0, 12.0), 1.0);
    let buffer = ramp(&header, Pad::default(), |c, r| {
        c as f32 * 0.37 + r as f32 * 0.11 - 5.0
    });

    for (name, scale) in [("q.i2=2/0.01/100", 0.01), ("q.b=4/0.1/-5", 0.1)] {
        let file = grid_file(&dir, name);
        let report = io.write_full(&file, &header, &buffer).unwrap();
        assert_eq!(report.clamped, 0, "{name}");

        let back = io.read_header(&file).unwrap();
        assert_eq!(back.scale_factor, scale);
        let read = io
            .read_grid(&file, &back, &Window::full(&back), Pad::default())
            .unwrap();
        for ((c, r, expected), (_, _, actual)) in cells(&buffer).into_iter().zip(cells(&read)) {
            assert!(
                (expected - actual).abs() <= (scale / 2.0) as f32 + 1e-4,
                "{name} ({c}, {r}): {expected} vs {actual}"
            );
        }
    }
}

#[test]
fn test_exact_formats() {
    let dir = tempfile::tempdir().unwrap();
    let io = GridIo::default();
    let header = pixel_header((0.0, 16.0), (0.0, 12.0), 1.0);
    let cases: [(&str, fn(usize, usize) -> f32); 4] = [
        ("mask.bit=5", |c, r| ((c + r) % 2) as f32),
        ("image.ras=3", |c, r| (c * 16 + r) as f32),
        ("surf.grd=6", |c, r| c as f32 / 3.0 - r as f32),
        ("surf.txt=6", |c, r| c as f32 * 1e-7 + r as f32 * 1e9),
    ];

    for (name, f) in cases {
        let buffer = ramp(&header, Pad::default(), f);
        let file = grid_file(&dir, name);
        io.write_full(&file, &header, &buffer).unwrap();
        let back = io.read_header(&file).unwrap();
        assert_eq!((back.nx, back.ny), (16, 12), "{name}");
        let read = io
            .read_grid(&file, &back, &Window::full(&back), Pad::default())
            .unwrap();
        assert_eq!(read.interior(), buffer.interior(), "{name}");
    }

    let ascii = GridIo::new(GridIoConfig {
        surfer_ascii: true,
        ..Default::default()
    });
    let buffer = ramp(&header, Pad::default(), |c, r| c as f32 * 1e-7 + r as f32 * 1e9);
    let file = grid_file(&dir, "surf.dsaa=6");
    ascii.write_full(&file, &header, &buffer).unwrap();
    let back = io.read_header(&file).unwrap();
    let read = io
        .read_grid(&file, &back, &Window::full(&back), Pad::default())
        .unwrap();
    assert_eq!(read.interior(), buffer.interior());
}

#[test]
fn test_missing_values_every_format() {
    let dir = tempfile::tempdir().unwrap();
    let io = GridIo::default();
    let header = pixel_header((0.0, 4.0), (0.0, 3.0), 1.0);
    let holes = [(1, 1), (3, 2), (0, 0)];

    for name in [
        "a.grd=1",
        "b.i2=2",
        "c.ras=3/1/0/255",
        "d.b=4/1/0/255",
        "e.bit=5/1/0/1",
        "f.grd=6",
    ] {
        // the bit format reserves 1 for missing, leaving only 0
        let bit = name.starts_with('e');
        let buffer = ramp(&header, Pad::default(), |c, r| {
            if holes.contains(&(c, r)) {
                f32::NAN
            } else if bit {
                0.0
            } else {
                (c + r) as f32
            }
        });
        let file = grid_file(&dir, name);
        let report = io.write_full(&file, &header, &buffer).unwrap();
        assert_eq!(report.missing_without_sentinel, 0, "{name}");

        let back = io.read_header(&file).unwrap();
        let read = io
            .read_grid(&file, &back, &Window::full(&back), Pad::default())
            .unwrap();
        for ((c, r, expected), (_, _, actual)) in cells(&buffer).into_iter().zip(cells(&read)) {
            if holes.contains(&(c, r)) {
                assert!(actual.is_nan(), "{name} ({c}, {r}) = {actual}");
            } else {
                assert_eq!(actual, expected, "{name} ({c}, {r})");
            }
        }
    }
}

#[test]
fn test_missing_value_without_sentinel_is_reported() {
    let dir = tempfile::tempdir().unwrap();
    let io = GridIo::default();
    let header = pixel_header((0.0, 2.0), (0.0, 1.0), 1.0);
    let buffer = GridBuffer::from_vec(vec![f32::NAN, 9.0], 2, 1, Pad::default(), false).unwrap();
    let file = grid_file(&dir, "nosentinel.b=4");

    let report = io.write_full(&file, &header, &buffer).unwrap();
    assert_eq!(report.missing_without_sentinel, 1);
    let back = io.read_header(&file).unwrap();
    assert_eq!(back.nan_value, None);
    let read = io
        .read_grid(&file, &back, &Window::full(&back), Pad::default())
        .unwrap();
    assert_eq!(read.interior(), vec![0.0, 9.0]);
}

#[test]
fn test_value_on_mid_range_sentinel_stays_valid() {
    let dir = tempfile::tempdir().unwrap();
    let io = GridIo::default();
    let header = pixel_header((0.0, 3.0), (0.0, 1.0), 1.0);
    let buffer =
        GridBuffer::from_vec(vec![99.0, 100.0, f32::NAN], 3, 1, Pad::default(), false).unwrap();
    let file = grid_file(&dir, "mid.b=4/1/0/100");

    let report = io.write_full(&file, &header, &buffer).unwrap();
    assert_eq!((report.clamped, report.sentinel_collisions), (0, 1));

    let back = io.read_header(&file).unwrap();
    let read = io
        .read_grid(&file, &back, &Window::full(&back), Pad::default())
        .unwrap();
    let values = read.interior();
    assert_eq!(&values[..2], &[99.0, 101.0]);
    assert!(values[2].is_nan());
}

#[test]
fn test_clamping_completes_and_reports() {
    let dir = tempfile::tempdir().unwrap();
    let io = GridIo::default();
    let header = pixel_header((0.0, 3.0), (0.0, 1.0), 1.0);
    let buffer =
        GridBuffer::from_vec(vec![40000.0, -40000.0, 12.0], 3, 1, Pad::default(), false).unwrap();
    let file = grid_file(&dir, "clamp.i2=2");

    let report = io.write_full(&file, &header, &buffer).unwrap();
    assert_eq!(report.clamped, 2);
    // -32768 is the sentinel, so the low end stops one short of it
    assert_eq!(report.limits, Some((-32767.0, 32767.0)));
    match report.into_result() {
        Err(GridError::ValueOutOfRange { count, min, max }) => {
            assert_eq!((count, min, max), (2, -32767.0, 32767.0));
        }
        other => panic!("expected ValueOutOfRange, got {other:?}"),
    }

    let back = io.read_header(&file).unwrap();
    let read = io
        .read_grid(&file, &back, &Window::full(&back), Pad::default())
        .unwrap();
    assert_eq!(read.interior(), vec![32767.0, -32767.0, 12.0]);
}

#[test]
fn test_complex_native_grid() {
    let dir = tempfile::tempdir().unwrap();
    let io = GridIo::default();
    let header = GridHeader {
        complex: true,
        ..pixel_header((0.0, 2.0), (0.0, 2.0), 1.0)
    };
    #[rustfmt::skip]
    let values = vec![
        1.0, -1.0,   2.0, -2.0,
        3.0, -3.0,   4.0, -4.0,
    ];
    let buffer = GridBuffer::from_vec(values.clone(), 2, 2, Pad::default(), true).unwrap();
    let file = grid_file(&dir, "complex.grd=1");
    io.write_full(&file, &header, &buffer).unwrap();

    let back = io.read_header(&file).unwrap();
    assert!(back.complex);
    let read = io
        .read_grid(&file, &back, &Window::full(&back), Pad::default())
        .unwrap();
    assert_eq!(read.into_vec(), values);

    let column = io
        .read_grid(&file, &back, &Window::new(1.0, 2.0, 0.0, 2.0), Pad::default())
        .unwrap();
    assert_eq!(column.interior(), vec![2.0, -2.0, 4.0, -4.0]);

    for name in ["complex.srf=6", "complex.ras=3"] {
        assert!(matches!(
            io.write_full(&grid_file(&dir, name), &header, &buffer),
            Err(GridError::Format(FormatError::Unsupported(_)))
        ));
    }
}

#[test]
fn test_big_endian_files_are_detected() {
    let dir = tempfile::tempdir().unwrap();
    let big = GridIo::new(GridIoConfig {
        byte_order: Endianness::BigEndian,
        ..Default::default()
    });
    let little = GridIo::new(GridIoConfig {
        byte_order: Endianness::LittleEndian,
        ..Default::default()
    });
    let header = pixel_header((0.0, 5.0), (0.0, 4.0), 1.0);
    let buffer = ramp(&header, Pad::default(), |c, r| c as f32 - 2.5 * r as f32);

    for name in ["be.grd=1", "be.i2=2/0.5"] {
        let file = grid_file(&dir, name);
        big.write_full(&file, &header, &buffer).unwrap();
        let bytes = std::fs::read(&file.path).unwrap();
        assert_eq!(&bytes[..4], &[0, 0, 0, 5], "{name}");

        // the reading side's preferred byte order does not matter
        for io in [&big, &little] {
            let back = io.read_header(&file).unwrap();
            assert_eq!((back.nx, back.ny), (5, 4));
            let read = io
                .read_grid(&file, &back, &Window::full(&back), Pad::default())
                .unwrap();
            assert_eq!(read.interior(), buffer.interior(), "{name}");
        }
    }
}

#[test]
fn test_header_only_file() {
    let dir = tempfile::tempdir().unwrap();
    let io = GridIo::default();
    let header = GridHeader {
        remark: "header only".into(),
        ..pixel_header((-180.0, 180.0), (-90.0, 90.0), 0.25)
    };
    let file = grid_file(&dir, "empty.grd");
    io.write_header(&file, &header).unwrap();
    assert_eq!(std::fs::metadata(&file.path).unwrap().len(), 900);
    assert_eq!(io.read_header(&file).unwrap(), header);
    assert_eq!(grdio::read_header(&file.path).unwrap(), header);
}

#[test]
fn test_read_overrides_value_transform() {
    let dir = tempfile::tempdir().unwrap();
    let io = GridIo::default();
    let header = pixel_header((0.0, 3.0), (0.0, 1.0), 1.0);
    let buffer = GridBuffer::from_vec(vec![1.0, 2.0, 3.0], 3, 1, Pad::default(), false).unwrap();
    io.write_full(&grid_file(&dir, "raw.i2=2"), &header, &buffer)
        .unwrap();

    let file = grid_file(&dir, "raw.i2=2/2/10");
    let back = io.read_header(&file).unwrap();
    assert_eq!((back.scale_factor, back.add_offset), (2.0, 10.0));
    let read = io
        .read_grid(&file, &back, &Window::full(&back), Pad::default())
        .unwrap();
    assert_eq!(read.interior(), vec![12.0, 14.0, 16.0]);
}
