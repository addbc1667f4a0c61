use std::sync::{
    Arc,
    atomic::{AtomicUsize, Ordering},
};

use proptest::prelude::*;

use super::*;

/// Runs `f` over output buffers of `chunk` bytes until it is done.
fn encode_chunked(
    cursor: &mut Cursor,
    chunk: usize,
    mut f: impl FnMut(&mut Writer<'_>) -> Result<Progress, CodecError>,
) -> Result<Vec<u8>, CodecError> {
    let mut out = Vec::new();
    let mut buf = vec![0; chunk];

    loop {
        let mut w = Writer::new(&mut buf, cursor);
        let progress = f(&mut w)?;
        let n = w.written();
        out.extend_from_slice(&buf[..n]);

        if progress.is_done() {
            return Ok(out);
        }
        assert!(n > 0, "no progress with a {chunk}-byte buffer");
    }
}

fn encode(f: impl FnMut(&mut Writer<'_>) -> Result<Progress, CodecError>) -> Vec<u8> {
    encode_chunked(&mut Cursor::default(), 64, f).unwrap()
}

/// Feeds `bytes` to `f`, `chunk` bytes at a time. Returns the number of bytes consumed.
fn decode_chunked(
    cursor: &mut Cursor,
    bytes: &[u8],
    chunk: usize,
    mut f: impl FnMut(&mut Reader<'_>) -> Result<Progress, CodecError>,
) -> Result<usize, CodecError> {
    let mut pos = 0;

    loop {
        let end = (pos + chunk).min(bytes.len());
        let mut r = Reader::new(&bytes[pos..end], cursor);
        let progress = f(&mut r)?;
        pos += r.consumed();

        if progress.is_done() {
            return Ok(pos);
        }
        if pos == bytes.len() {
            return Err(CodecError::Truncated);
        }
    }
}

#[yare::parameterized(
    zero     = { 0, 0 },
    b254     = { 254, 1 },
    b255     = { 255, 1 },
    b65534   = { 65_534, 2 },
    b65535   = { 65_535, 2 },
    b16m_1   = { 16_777_214, 3 },
    b16m     = { 16_777_215, 3 },
    b16m_p1  = { 16_777_216, 4 },
    max      = { u32::MAX, 4 },
)]
fn minimal_width(value: u32, width: usize) {
    assert_eq!(bytes_needed(value), width);

    let bytes = encode(|w| Ok(Progress::done_if(w.put_val(u64::from(value), width))));
    assert_eq!(bytes.len(), width);

    let mut cursor = Cursor::default();
    let mut got = None;
    decode_chunked(&mut cursor, &bytes, 1, |r| {
        got = r.get_val(width);
        Ok(Progress::done_if(got.is_some()))
    })
    .unwrap();

    assert_eq!(got, Some(u64::from(value)));
}

#[test]
fn primitives_are_written_whole_or_not_at_all() {
    let mut cursor = Cursor::default();
    let mut buf = [0; 3];
    let mut w = Writer::new(&mut buf, &mut cursor);

    assert!(!w.put(0x0102_0304_u32));
    assert_eq!(w.written(), 0);

    assert!(w.put(0x0102_u16));
    assert!(!w.put(0x0102_u16));
    assert_eq!(w.written(), 2);
}

#[test]
fn split_primitive_is_accumulated_across_buffers() {
    let bytes = (-123_456_789_i64).to_le_bytes();
    let mut cursor = Cursor::default();

    let mut r = Reader::new(&bytes[..3], &mut cursor);
    assert_eq!(r.get::<i64>(), None);
    assert_eq!(r.consumed(), 3);

    let mut r = Reader::new(&bytes[3..5], &mut cursor);
    assert_eq!(r.get::<i64>(), None);

    let mut r = Reader::new(&bytes[5..], &mut cursor);
    assert_eq!(r.get::<i64>(), Some(-123_456_789));
    assert!(cursor.is_idle());
}

#[test]
fn floats_travel_as_their_bit_pattern() {
    assert_eq!(f32::from_wire(1.5_f32.to_wire()), 1.5);
    assert_eq!(f64::from_wire(f64::NEG_INFINITY.to_wire()), f64::NEG_INFINITY);
    assert!(f64::from_wire(f64::NAN.to_wire()).is_nan());
    assert_eq!(i16::from_wire((-2_i16).to_wire()), -2);
    assert_eq!((-2_i16).to_wire(), 0xFFFE);
}

#[test]
fn empty_collections_are_a_single_zero_byte() {
    assert_eq!(encode(|w| w.put_bytes(&[], 10)), [0]);
    assert_eq!(encode(|w| w.put_str("", 10)), [0]);
    assert_eq!(encode(|w| w.put_array::<u32>(&[], 10)), [0]);
    assert_eq!(encode(|w| w.put_seq::<u16>(&[], 10)), [0]);
    assert_eq!(encode(|w| w.put_map(&Map::<u8, u8>::new(), 10)), [0]);
}

#[test]
fn strings_carry_a_minimal_length_prefix() {
    assert_eq!(encode(|w| w.put_str("ok", 255)), [1, 2, b'o', b'k']);

    let long = "x".repeat(300);
    let bytes = encode(|w| w.put_str(&long, 65_000));
    assert_eq!(bytes[..3], [2, 0x2C, 0x01]);
    assert_eq!(bytes.len(), 3 + 300);
}

#[test]
fn length_at_max_succeeds_and_one_past_fails() {
    let mut cursor = Cursor::default();
    assert!(encode_chunked(&mut cursor, 16, |w| w.put_bytes(&[7; 4], 4)).is_ok());

    let mut cursor = Cursor::default();
    let err = encode_chunked(&mut cursor, 16, |w| w.put_bytes(&[7; 5], 4)).unwrap_err();
    assert_eq!(
        err,
        CodecError::Overflow(Overflow {
            pack: "",
            field: 0,
            max: 4,
            len: 5
        })
    );

    let bytes = encode(|w| w.put_array(&[1_u16, 2, 3, 4, 5], 10));

    let mut out: Vec<u16> = Vec::new();
    let mut cursor = Cursor::default();
    assert!(decode_chunked(&mut cursor, &bytes, 64, |r| r.get_array(&mut out, 5)).is_ok());
    assert_eq!(out, [1, 2, 3, 4, 5]);

    let mut cursor = Cursor::default();
    let err = decode_chunked(&mut cursor, &bytes, 64, |r| r.get_array(&mut out, 4)).unwrap_err();
    assert!(matches!(err, CodecError::Overflow(Overflow { max: 4, len: 5, .. })));
}

#[test]
fn clamped_write_keeps_the_first_elements_and_reports_once() {
    let reports = Arc::new(AtomicUsize::new(0));
    let counter = reports.clone();

    let mut cursor = Cursor::new(CodecConfig::lenient()).with_overflow_handler(move |o| {
        assert_eq!((o.max, o.len), (3, 6));
        counter.fetch_add(1, Ordering::Relaxed);
    });

    // 3-byte buffers split the body across calls
    let bytes = encode_chunked(&mut cursor, 3, |w| w.put_array(&[1_u8, 2, 3, 4, 5, 6], 3)).unwrap();

    assert_eq!(bytes, [1, 3, 1, 2, 3]);
    assert_eq!(reports.load(Ordering::Relaxed), 1);
}

#[test]
fn clamped_read_consumes_every_declared_element() {
    let mut bytes = encode(|w| w.put_array(&[10_u32, 20, 30, 40], 10));
    bytes.push(0xAA);

    let mut cursor = Cursor::new(CodecConfig::lenient());
    let mut out: Vec<u32> = Vec::new();
    let consumed = decode_chunked(&mut cursor, &bytes, 3, |r| r.get_array(&mut out, 2)).unwrap();

    assert_eq!(out, [10, 20]);
    assert_eq!(consumed, bytes.len() - 1);
}

#[test]
fn clamped_string_is_cut_at_a_char_boundary() {
    let mut cursor = Cursor::new(CodecConfig::lenient());
    let bytes = encode_chunked(&mut cursor, 16, |w| w.put_str("hé!", 2)).unwrap();
    assert_eq!(bytes, [1, 1, b'h']);

    let bytes = encode(|w| w.put_str("hé", 10));
    let mut out = String::new();
    let mut cursor = Cursor::new(CodecConfig::lenient());
    decode_chunked(&mut cursor, &bytes, 1, |r| r.get_str(&mut out, 2)).unwrap();
    assert_eq!(out, "h");
}

#[test]
fn invalid_utf8_is_rejected() {
    let bytes = encode(|w| w.put_bytes(&[0xFF, 0xFE], 10));
    let mut out = String::new();
    let err = decode_chunked(&mut Cursor::default(), &bytes, 64, |r| r.get_str(&mut out, 10));

    assert_eq!(err, Err(CodecError::InvalidUtf8 { pack: "", field: 0 }));
}

#[yare::parameterized(
    too_wide = { &[5], 5 },
    stray_bits = { &[0x11], 0x11 },
)]
fn bad_length_width(bytes: &[u8], control: u8) {
    let mut out = Vec::new();
    let err = decode_chunked(&mut Cursor::default(), bytes, 64, |r| r.get_bytes(&mut out, 10));
    assert_eq!(err, Err(CodecError::BadWidth(control)));
}

#[test]
fn map_control_byte_layout() {
    // empty
    assert_eq!(encode(|w| w.put_map(&Map::<u8, u16>::new(), 8)), [0x00]);

    // only a null key, without a value
    let mut map = Map::<u8, u16>::new();
    map.insert_null_key(None);
    assert_eq!(encode(|w| w.put_map(&map, 8)), [0x40]);

    // only a null key, with a value
    map.insert_null_key(Some(7));
    assert_eq!(encode(|w| w.put_map(&map, 8)), [0xC0, 7, 0]);

    // one valued entry, one null-valued key
    let map: Map<u8, u16> = [(1, Some(10)), (2, None)].into_iter().collect();
    assert_eq!(encode(|w| w.put_map(&map, 8)), [0x09, 1, 1, 1, 10, 0, 2]);
}

#[yare::parameterized(
    empty = { Map::new() },
    null_key_only = { Map { entries: Default::default(), null_key: Some(None) } },
    valued_null_key_only = { Map { entries: Default::default(), null_key: Some(Some(-1)) } },
    mixed = { [(1, Some(10)), (2, None), (3, Some(-30)), (4, None)].into_iter().collect() },
    everything = {
        Map {
            entries: [(9, None), (8, Some(i32::MIN))].into_iter().collect(),
            null_key: Some(Some(i32::MAX)),
        }
    },
)]
fn map_round_trip_byte_at_a_time(map: Map<u16, i32>) {
    let bytes = encode(|w| w.put_map(&map, 16));

    let mut out = Map::new();
    out.insert(77, None);

    let consumed = decode_chunked(&mut Cursor::default(), &bytes, 1, |r| r.get_map(&mut out, 16)).unwrap();

    assert_eq!(consumed, bytes.len());
    assert_eq!(out, map);
}

#[test]
fn map_overflow_counts_both_kinds_of_entries() {
    let map: Map<u8, u8> = [(1, Some(1)), (2, None), (3, None)].into_iter().collect();

    let err = encode_chunked(&mut Cursor::default(), 16, |w| w.put_map(&map, 2)).unwrap_err();
    assert!(matches!(err, CodecError::Overflow(Overflow { max: 2, len: 3, .. })));

    let bytes = encode(|w| w.put_map(&map, 3));
    let mut out: Map<u8, u8> = Map::new();
    let mut cursor = Cursor::new(CodecConfig::lenient());
    let consumed = decode_chunked(&mut cursor, &bytes, 2, |r| r.get_map(&mut out, 2)).unwrap();

    assert_eq!(consumed, bytes.len());
    assert_eq!(out.entries.len(), 2);
    assert_eq!(out.get(&1), Some(&Some(1)));
}

#[test]
fn headers_may_fill_the_buffer_exactly() {
    let mut cursor = Cursor::default();
    let mut buf = [0; 6];
    let mut w = Writer::new(&mut buf, &mut cursor);
    assert_eq!(w.put_array(&[1_u16, 2], 10), Ok(Progress::Done));
    assert_eq!(w.written(), 6);
    assert_eq!(buf, [1, 2, 1, 0, 2, 0]);

    let map: Map<u8, u16> = [(1, Some(10)), (2, None)].into_iter().collect();
    let mut cursor = Cursor::default();
    let mut buf = [0; 3];
    let mut w = Writer::new(&mut buf, &mut cursor);
    assert_eq!(w.put_map(&map, 8), Ok(Progress::Pending));
    assert_eq!(w.written(), 3);
    assert_eq!(buf, [0x09, 1, 1]);
}

#[test]
fn completed_collection_is_a_no_op() {
    let mut cursor = Cursor::default();
    let mut buf = [0; 16];

    let mut w = Writer::new(&mut buf, &mut cursor);
    assert_eq!(w.put_str("abc", 10), Ok(Progress::Done));
    assert_eq!(w.put_str("abc", 10), Ok(Progress::Done));
    assert_eq!(w.written(), 5);
}

#[test]
fn reset_discards_partial_state() {
    let mut cursor = Cursor::default();
    let mut out = Vec::new();

    let mut r = Reader::new(&[2, 0x2C], &mut cursor);
    assert_eq!(r.get_bytes(&mut out, 1000), Ok(Progress::Pending));
    assert!(!cursor.is_idle());

    cursor.reset();
    assert!(cursor.is_idle());

    let mut r = Reader::new(&[1, 1, 9], &mut cursor);
    assert_eq!(r.get_bytes(&mut out, 1000), Ok(Progress::Done));
    assert_eq!(out, [9]);
}

proptest! {
    #[test]
    fn bytes_survive_any_chunking(data in prop::collection::vec(any::<u8>(), 0..600), chunk in 1..40_usize) {
        let bytes = encode_chunked(&mut Cursor::default(), chunk.max(MIN_BUFFER_LEN), |w| w.put_bytes(&data, 600)).unwrap();

        let mut out = vec![1, 2, 3];
        decode_chunked(&mut Cursor::default(), &bytes, chunk, |r| r.get_bytes(&mut out, 600)).unwrap();
        prop_assert_eq!(out, data);
    }

    #[test]
    fn strings_survive_any_chunking(s in "\\PC{0,80}", chunk in 1..12_usize) {
        let bytes = encode(|w| w.put_str(&s, 1000));

        let mut out = String::new();
        decode_chunked(&mut Cursor::default(), &bytes, chunk, |r| r.get_str(&mut out, 1000)).unwrap();
        prop_assert_eq!(out, s);
    }

    #[test]
    fn arrays_survive_any_chunking(data in prop::collection::vec(any::<i32>(), 0..100), chunk in 1..20_usize) {
        let bytes = encode_chunked(&mut Cursor::default(), chunk.max(MIN_BUFFER_LEN), |w| w.put_array(&data, 100)).unwrap();

        let mut out: Vec<i32> = Vec::new();
        decode_chunked(&mut Cursor::default(), &bytes, chunk, |r| r.get_array(&mut out, 100)).unwrap();
        prop_assert_eq!(out, data);
    }

    #[test]
    fn sequences_survive_any_chunking(data in prop::collection::vec(any::<f64>(), 0..50), chunk in 1..20_usize) {
        let bytes = encode_chunked(&mut Cursor::default(), chunk.max(MIN_BUFFER_LEN), |w| w.put_seq(&data, 50)).unwrap();

        let mut out: Vec<f64> = Vec::new();
        decode_chunked(&mut Cursor::default(), &bytes, chunk, |r| r.get_seq(&mut out, 50)).unwrap();
        prop_assert_eq!(out.len(), data.len());
        for (a, b) in out.iter().zip(&data) {
            prop_assert_eq!(a.to_bits(), b.to_bits());
        }
    }

    #[test]
    fn maps_survive_any_chunking(
        entries in prop::collection::hash_map(any::<u32>(), prop::option::of(any::<u64>()), 0..40),
        null_key in prop::option::of(prop::option::of(any::<u64>())),
        chunk in 1..20_usize,
    ) {
        let mut map: Map<u32, u64> = entries.into_iter().collect();
        map.null_key = null_key;

        let bytes = encode_chunked(&mut Cursor::default(), chunk.max(MIN_BUFFER_LEN), |w| w.put_map(&map, 40)).unwrap();

        let mut out = Map::new();
        decode_chunked(&mut Cursor::default(), &bytes, chunk, |r| r.get_map(&mut out, 40)).unwrap();
        prop_assert_eq!(out, map);
    }
}
