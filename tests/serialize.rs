use compressed_static_function::{Builder, Csf, CsfError, FilterConfig, MultisetCsf};

fn numbered_keys(count: usize) -> Vec<Vec<u8>> {
    (0..count).map(|i| format!("key{i}").into_bytes()).collect()
}

fn skewed_u32s(count: usize) -> Vec<u32> {
    (0..count as u32).map(|i| if i % 16 == 0 { 1 + i % 9 } else { 0 }).collect()
}

fn save_bytes<V: compressed_static_function::Value>(csf: &Csf<V>) -> Vec<u8> {
    let mut buf = Vec::new();
    csf.save(&mut buf).unwrap();
    buf
}

#[test]
fn reloaded_artifact_answers_identically() {
    let keys = [b"key1".to_vec(), b"key2".to_vec(), b"key3".to_vec()];
    let values = vec![1u32, 2, 3];
    let csf = Builder::new().build(&keys, &values).unwrap();

    let buf = save_bytes(&csf);
    let reloaded: Csf<u32> = Csf::load(&mut std::io::Cursor::new(&buf)).unwrap();
    for (key, value) in keys.iter().zip(&values) {
        assert_eq!(reloaded.query(key), *value);
    }
}

#[test]
fn save_load_save_is_bit_identical_for_all_value_types() {
    let keys = numbered_keys(3000);

    let u32s: Vec<u32> = skewed_u32s(3000);
    let csf = Builder::new().build(&keys, &u32s).unwrap();
    let first = save_bytes(&csf);
    let reloaded: Csf<u32> = Csf::load(&mut std::io::Cursor::new(&first)).unwrap();
    assert_eq!(save_bytes(&reloaded), first);

    let u64s: Vec<u64> = (0..3000u64).map(|i| i * i).collect();
    let csf = Builder::new().build(&keys, &u64s).unwrap();
    let first = save_bytes(&csf);
    let reloaded: Csf<u64> = Csf::load(&mut std::io::Cursor::new(&first)).unwrap();
    assert_eq!(save_bytes(&reloaded), first);

    let blobs: Vec<Vec<u8>> = (0..3000usize)
        .map(|i| format!("blob{}", i % 23).into_bytes())
        .collect();
    let csf = Builder::new().build(&keys, &blobs).unwrap();
    let first = save_bytes(&csf);
    let reloaded: Csf<Vec<u8>> = Csf::load(&mut std::io::Cursor::new(&first)).unwrap();
    assert_eq!(save_bytes(&reloaded), first);

    let tens: Vec<[u8; 10]> = (0..3000u32)
        .map(|i| {
            let mut buf = [0u8; 10];
            buf[..4].copy_from_slice(&(i % 40).to_le_bytes());
            buf
        })
        .collect();
    let csf = Builder::new().build(&keys, &tens).unwrap();
    let first = save_bytes(&csf);
    let reloaded: Csf<[u8; 10]> = Csf::load(&mut std::io::Cursor::new(&first)).unwrap();
    assert_eq!(save_bytes(&reloaded), first);
}

#[test]
fn save_load_save_is_bit_identical_for_all_filters() {
    let keys = numbered_keys(10_000);
    let values = skewed_u32s(10_000);
    for config in [
        FilterConfig::Bloom {
            error_rate: 1.0 / 256.0,
            num_hashes: None,
        },
        FilterConfig::Xor {
            fingerprint_bits: 8,
        },
        FilterConfig::BinaryFuse {
            fingerprint_bits: 8,
        },
    ] {
        let csf = Builder::new()
            .with_filter(config.clone())
            .build(&keys, &values)
            .unwrap();
        let first = save_bytes(&csf);
        let reloaded: Csf<u32> = Csf::load(&mut std::io::Cursor::new(&first)).unwrap();
        assert_eq!(save_bytes(&reloaded), first, "unstable bytes for {config:?}");
        for (key, value) in keys.iter().zip(&values) {
            assert_eq!(reloaded.query(key), *value);
        }
    }
}

#[test]
fn value_type_mismatch_is_detected() {
    let keys = numbered_keys(100);
    let values: Vec<u32> = (0..100).collect();
    let csf = Builder::new().build(&keys, &values).unwrap();
    let buf = save_bytes(&csf);
    let result: Result<Csf<u64>, _> = Csf::load(&mut std::io::Cursor::new(&buf));
    assert!(matches!(result, Err(CsfError::Deserialization(_))));
}

#[test]
fn multiset_round_trips_through_bytes() {
    let keys = numbered_keys(1500);
    let rows: Vec<Vec<u32>> = (0..1500u32)
        .map(|i| vec![i % 7, i % 3, 5])
        .collect();
    let multiset = Builder::new().build_multiset(&keys, &rows).unwrap();

    let mut buf = Vec::new();
    multiset.save(&mut buf).unwrap();
    let reloaded: MultisetCsf<u32> =
        MultisetCsf::load(&mut std::io::Cursor::new(&buf)).unwrap();
    assert_eq!(reloaded.num_columns(), 3);
    for (key, row) in keys.iter().zip(&rows) {
        assert_eq!(reloaded.query(key), *row);
    }

    let mut again = Vec::new();
    reloaded.save(&mut again).unwrap();
    assert_eq!(again, buf);
}

#[test]
fn single_and_multiset_type_ids_differ() {
    let keys = numbered_keys(100);
    let values: Vec<u32> = (0..100).collect();
    let csf = Builder::new().build(&keys, &values).unwrap();
    let buf = save_bytes(&csf);
    let result: Result<MultisetCsf<u32>, _> =
        MultisetCsf::load(&mut std::io::Cursor::new(&buf));
    assert!(matches!(result, Err(CsfError::Deserialization(_))));
}

#[test]
fn truncated_stream_is_an_error() {
    let keys = numbered_keys(200);
    let values: Vec<u32> = (0..200).collect();
    let csf = Builder::new().build(&keys, &values).unwrap();
    let buf = save_bytes(&csf);
    let result: Result<Csf<u32>, _> =
        Csf::load(&mut std::io::Cursor::new(&buf[..buf.len() / 2]));
    assert!(matches!(result, Err(CsfError::Io(_))));
}

#[cfg(feature = "serde")]
#[test]
fn bincode_convenience_round_trips() {
    let keys = numbered_keys(500);
    let values: Vec<u32> = (0..500u32).map(|i| i % 13).collect();
    let csf = Builder::new().build(&keys, &values).unwrap();
    let restored = Csf::<u32>::from_bytes(&csf.to_bytes().unwrap()).unwrap();
    assert_eq!(restored, csf);
}
