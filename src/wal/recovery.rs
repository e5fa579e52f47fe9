//! Sequential replay of a WAL segment.

use tracing::warn;

use crate::error::{Error, Result};
use crate::fio::{read_all, ReadableFile};

use super::record::WalRecord;

/// Replays every complete frame in `file`, invoking `apply` per record.
///
/// A segment that ends mid-frame (the expected shape of a crash during the
/// final append) yields all frames before the tear and succeeds. Any other
/// parse failure, a checksum mismatch above all, aborts replay with the
/// error; nothing after a damaged frame can be trusted, so there is no
/// resynchronization.
///
/// Returns the number of records applied.
pub fn recover<F>(file: &mut dyn ReadableFile, mut apply: F) -> Result<usize>
where
    F: FnMut(WalRecord),
{
    let buf = read_all(file);
    let mut input = buf.as_slice();
    let mut applied = 0usize;

    while !input.is_empty() {
        match WalRecord::parse_frame(&mut input) {
            Ok(record) => {
                apply(record);
                applied += 1;
            }
            Err(Error::TruncatedHeader) | Err(Error::TruncatedPayload) => {
                warn!(
                    applied,
                    trailing = input.len(),
                    "wal segment ends mid-frame, stopping replay"
                );
                return Ok(applied);
            }
            Err(err) => return Err(err),
        }
    }

    Ok(applied)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fio::{FileManager, MemFileManager};
    use crate::wal::WalWriter;
    use std::path::Path;

    fn write_segment(manager: &MemFileManager, path: &Path, records: &[WalRecord]) {
        let mut writer = WalWriter::new(manager.new_writable(path).unwrap());
        for record in records {
            writer.append(record).unwrap();
        }
        writer.sync().unwrap();
    }

    #[test]
    fn replays_all_records_in_order() {
        let manager = MemFileManager::new();
        let path = Path::new("0001.wal");
        let records = vec![
            WalRecord::begin(1),
            WalRecord::put(1, "apple", "red"),
            WalRecord::delete(1, "banana"),
            WalRecord::commit(1),
        ];
        write_segment(&manager, path, &records);

        let mut replayed = Vec::new();
        let mut reader = manager.new_readable(path).unwrap();
        let applied = recover(reader.as_mut(), |r| replayed.push(r)).unwrap();

        assert_eq!(applied, 4);
        assert_eq!(replayed, records);
    }

    #[test]
    fn empty_segment_replays_nothing() {
        let manager = MemFileManager::new();
        let path = Path::new("0002.wal");
        manager.new_writable(path).unwrap();

        let mut reader = manager.new_readable(path).unwrap();
        let applied = recover(reader.as_mut(), |_| panic!("no records expected")).unwrap();
        assert_eq!(applied, 0);
    }

    #[test]
    fn torn_tail_frame_is_dropped() {
        let _ = tracing_subscriber::fmt().with_test_writer().try_init();

        let manager = MemFileManager::new();
        let full = Path::new("full.wal");
        let records = vec![WalRecord::put(1, "a", "1"), WalRecord::put(1, "b", "2")];
        write_segment(&manager, full, &records);

        // Rewrite the segment with the last frame cut short.
        let mut bytes = manager.contents(full).unwrap();
        bytes.truncate(bytes.len() - 3);
        let torn = Path::new("torn.wal");
        let mut w = manager.new_writable(torn).unwrap();
        w.write(&bytes);
        w.close();

        let mut replayed = Vec::new();
        let mut reader = manager.new_readable(torn).unwrap();
        let applied = recover(reader.as_mut(), |r| replayed.push(r)).unwrap();

        assert_eq!(applied, 1);
        assert_eq!(replayed, records[..1]);
    }

    #[test]
    fn corrupt_frame_aborts_replay() {
        let manager = MemFileManager::new();
        let path = Path::new("0003.wal");
        write_segment(
            &manager,
            path,
            &[WalRecord::put(1, "a", "1"), WalRecord::put(1, "b", "2")],
        );

        let mut bytes = manager.contents(path).unwrap();
        bytes[10] ^= 0x01; // payload byte of the first frame

        let bad = Path::new("bad.wal");
        let mut w = manager.new_writable(bad).unwrap();
        w.write(&bytes);
        w.close();

        let mut reader = manager.new_readable(bad).unwrap();
        let result = recover(reader.as_mut(), |_| {});
        assert!(matches!(result, Err(Error::CrcMismatch { .. })));
    }
}
