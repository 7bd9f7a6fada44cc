//! End-to-end write/read sessions against real files

use binseek::{
    AttrValue, Container, ContainerBuilder, ContainerError, ErrorKind, LogRecord, Mode, NdArray,
    Order,
};
use std::fs::OpenOptions;
use tempfile::TempDir;

#[test]
fn test_write_then_read_scenario() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("scenario.hbin");

    let arr1 = NdArray::from_vec(vec![3], &[10i16, -20, 30]).unwrap();
    let arr2 = NdArray::from_vec(vec![2, 2], &[1i32, 2, 3, 4]).unwrap();

    {
        let mut container = Container::open(&path, "w").unwrap();
        let mut group = container.create_group("/A/B").unwrap();

        let h1 = group.create_array("arr1", &arr1).unwrap();
        let h2 = group.create_array("arr2", &arr2).unwrap();
        group.set_attr("label", "first run").unwrap();
        group.set_attr("gain", 0.25).unwrap();

        assert_eq!(h1.record_offset(), 14);
        assert_eq!(h1.data_offset(), 83);
        assert_eq!(h1.bytes_len(), 6);
        assert_eq!(h2.record_offset(), 89);
        assert_eq!(h2.data_offset(), 166);
        assert_eq!(h2.bytes_len(), 16);

        container.close().unwrap();
    }

    let data = std::fs::read(dir.path().join("scenario.hdat")).unwrap();
    assert_eq!(data.len(), 182);
    assert_eq!(&data[..14], b"%BINSEEK v001\n");
    assert_eq!(&data[14..18], b"ARR:");
    assert_eq!(&data[89..93], b"ARR:");

    let container = Container::open(&path, "r").unwrap();
    assert_eq!(container.list_groups().unwrap(), vec!["A"]);
    assert_eq!(container.len().unwrap(), 2);

    let group = container.group("/A/B").unwrap();
    assert_eq!(group.list_arrays(), vec!["arr1", "arr2"]);
    assert_eq!(
        group.get_attr("label").unwrap(),
        &AttrValue::Text("first run".into())
    );
    assert_eq!(group.get_attr("gain").unwrap(), &AttrValue::Double(0.25));

    let read1 = group.get_array("arr1").unwrap().read(&container).unwrap();
    let read2 = group.get_array("arr2").unwrap().read(&container).unwrap();
    assert_eq!(read1.as_bytes(), arr1.as_bytes());
    assert_eq!(read1.to_vec::<i16>().unwrap(), vec![10, -20, 30]);
    assert_eq!(read2.shape(), &[2, 2]);
    assert_eq!(read2.to_vec::<i32>().unwrap(), vec![1, 2, 3, 4]);
}

#[test]
fn test_dirty_flag_and_concurrent_reader() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("live.hbin");

    let mut writer = ContainerBuilder::new()
        .mode(Mode::Write)
        .autoflush(false)
        .open(&path)
        .unwrap();
    assert!(writer.is_dirty());

    writer
        .create_array("/live", "x", &NdArray::from_vec(vec![4], &[1.5f64, 2.5, 3.5, 4.5]).unwrap())
        .unwrap();
    assert!(writer.is_dirty());

    {
        let reader = Container::open(&path, "r").unwrap();
        assert_eq!(reader.len().unwrap(), 0);
    }

    writer.flush().unwrap();
    assert!(!writer.is_dirty());

    let reader = Container::open(&path, "r").unwrap();
    assert_eq!(reader.len().unwrap(), 1);
    let handle = reader.group("/live").unwrap().get_array("x").unwrap();
    assert_eq!(
        handle.read(&reader).unwrap().to_vec::<f64>().unwrap(),
        vec![1.5, 2.5, 3.5, 4.5]
    );

    writer.close().unwrap();
}

#[test]
fn test_autoflush_keeps_session_clean() {
    let dir = TempDir::new().unwrap();
    let mut writer = Container::open(dir.path().join("a.hbin"), "w").unwrap();
    assert!(!writer.is_dirty());

    writer.create_group("/g").unwrap().set_attr("n", 1).unwrap();
    assert!(!writer.is_dirty());

    // Records are on disk even though no snapshot was written yet
    let records: Vec<LogRecord> = writer
        .log_reader()
        .unwrap()
        .collect::<binseek::Result<_>>()
        .unwrap();
    assert_eq!(records.len(), 1);
}

#[test]
fn test_column_major_round_trip() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("fortran.hbin");

    // Logical [[1, 2, 3], [4, 5, 6]]
    let arr = NdArray::from_vec_column_major(vec![2, 3], &[1u16, 4, 2, 5, 3, 6]).unwrap();
    {
        let mut container = Container::open(&path, "w").unwrap();
        let handle = container.create_array("/f", "m", &arr).unwrap();
        assert_eq!(handle.order(), Order::ColumnMajor);
        assert_eq!(handle.shape(), &[2, 3]);
    }

    let container = Container::open(&path, "r").unwrap();
    let read = container
        .group("/f")
        .unwrap()
        .get_array("m")
        .unwrap()
        .read(&container)
        .unwrap();

    assert_eq!(read.order(), Order::ColumnMajor);
    assert_eq!(read.shape(), &[2, 3]);
    assert_eq!(read.as_bytes(), arr.as_bytes());
    assert_eq!(read.to_vec::<u16>().unwrap(), vec![1, 2, 3, 4, 5, 6]);
}

#[test]
fn test_truncated_data_file_is_corruption() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("cut.hbin");

    let handle = {
        let mut container = Container::open(&path, "w").unwrap();
        let handle = container
            .create_array("/g", "big", &NdArray::from_vec(vec![100], &[7u32; 100]).unwrap())
            .unwrap();
        container.close().unwrap();
        handle
    };

    let data_path = dir.path().join("cut.hdat");
    let file = OpenOptions::new().write(true).open(&data_path).unwrap();
    file.set_len(handle.data_offset() + handle.bytes_len() - 1)
        .unwrap();
    drop(file);

    let container = Container::open(&path, "r").unwrap();
    let err = container
        .group("/g")
        .unwrap()
        .get_array("big")
        .unwrap()
        .read(&container)
        .unwrap_err();

    assert_eq!(err.kind(), ErrorKind::Corruption);
    assert!(matches!(
        err,
        ContainerError::Corruption {
            expected: 400,
            actual: 399,
            ..
        }
    ));
}

#[test]
fn test_log_mirrors_writes() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("log.hbin");

    let mut container = Container::open(&path, "w").unwrap();
    let h1 = container
        .create_array("/A", "a", &NdArray::from_vec(vec![2], &[1u8, 2]).unwrap())
        .unwrap();
    container
        .create_group("/A/B")
        .unwrap()
        .set_attr("raw", vec![0u8, 1, 2])
        .unwrap();
    let h2 = container
        .create_array("/A/B", "b", &NdArray::from_vec(vec![1, 1], &[9i64]).unwrap())
        .unwrap();
    container.close().unwrap();

    let records: Vec<LogRecord> = binseek::LogReader::open(dir.path().join("log.hlog"))
        .unwrap()
        .strict()
        .collect::<binseek::Result<_>>()
        .unwrap();

    assert_eq!(records.len(), 3);
    match &records[0] {
        LogRecord::Array {
            group,
            name,
            record_offset,
            bytes_len,
            ..
        } => {
            assert_eq!(group, "/A");
            assert_eq!(name, "a");
            assert_eq!(*record_offset, h1.record_offset());
            assert_eq!(*bytes_len, 2);
        }
        other => panic!("expected array record, got {:?}", other),
    }
    assert_eq!(
        records[1],
        LogRecord::Attr {
            group: "/A/B".into(),
            name: "raw".into(),
            value: AttrValue::Bytes(vec![0, 1, 2]),
        }
    );
    match &records[2] {
        LogRecord::Array {
            group,
            shape,
            record_offset,
            ..
        } => {
            assert_eq!(group, "/A/B");
            assert_eq!(shape, &vec![1u64, 1]);
            assert_eq!(*record_offset, h2.record_offset());
        }
        other => panic!("expected array record, got {:?}", other),
    }
}

#[test]
fn test_without_metadata_reader_sees_empty_tree() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("nometa.hbin");

    {
        let mut container = ContainerBuilder::new()
            .mode(Mode::Write)
            .write_metadata(false)
            .open(&path)
            .unwrap();
        container
            .create_array("/g", "a", &NdArray::from_vec(vec![1], &[1u8]).unwrap())
            .unwrap();
        container.close().unwrap();
    }

    assert!(!path.exists());
    let container = Container::open(&path, "r").unwrap();
    assert!(container.is_empty().unwrap());
}

#[test]
fn test_flush_with_overrides_snapshot() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("fw.hbin");

    let mut container = Container::open(&path, "w").unwrap();
    container.create_group("/g").unwrap();

    container.flush_with(false).unwrap();
    assert!(!path.exists());

    container.flush_with(true).unwrap();
    assert!(path.exists());
}

#[test]
fn test_repeated_array_name_points_at_newest() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("rep.hbin");

    {
        let mut container = Container::open(&path, "w").unwrap();
        let mut group = container.create_group("/g").unwrap();
        let first = group
            .create_array("a", &NdArray::from_vec(vec![1], &[1u8]).unwrap())
            .unwrap();
        let second = group
            .create_array("a", &NdArray::from_vec(vec![2], &[2u8, 3]).unwrap())
            .unwrap();
        assert!(second.record_offset() > first.record_offset());
        assert_eq!(group.list_arrays(), vec!["a"]);
    }

    let container = Container::open(&path, "r").unwrap();
    let read = container
        .group("/g")
        .unwrap()
        .get_array("a")
        .unwrap()
        .read(&container)
        .unwrap();
    assert_eq!(read.to_vec::<u8>().unwrap(), vec![2, 3]);
}
