use std::fs::{self, OpenOptions};
use std::io::Write;
use std::path::Path;

use chrono::NaiveDate;
use mission_deck_core::LogTailer;
use speculate2::speculate;

fn day(d: u32) -> NaiveDate {
    NaiveDate::from_ymd_opt(2026, 10, d).expect("valid date")
}

fn append(path: &Path, bytes: &[u8]) {
    let mut file = OpenOptions::new()
        .create(true)
        .append(true)
        .open(path)
        .expect("Failed to open log");
    file.write_all(bytes).expect("Failed to append");
}

speculate! {
    before {
        let dir = tempfile::tempdir().expect("Failed to create temp dir");
        let mut tailer = LogTailer::new(dir.path(), "gateway");
        let today = tailer.path_for(day(19));
    }

    describe "waiting" {
        it "treats a missing file as nothing to read" {
            let lines = tailer.poll_on(day(19)).expect("poll failed");
            assert!(lines.is_empty());
        }

        it "picks the file up once it appears" {
            tailer.poll_on(day(19)).expect("poll failed");
            append(&today, b"hello\n");
            assert_eq!(tailer.poll_on(day(19)).expect("poll failed"), vec!["hello"]);
        }
    }

    describe "incremental reads" {
        it "never emits a line before its newline arrives" {
            append(&today, b"first\nsec");
            assert_eq!(tailer.poll_on(day(19)).expect("poll failed"), vec!["first"]);

            append(&today, b"ond");
            assert!(tailer.poll_on(day(19)).expect("poll failed").is_empty());

            append(&today, b"\n");
            assert_eq!(tailer.poll_on(day(19)).expect("poll failed"), vec!["second"]);
        }

        it "emits the same lines however appends are split across polls" {
            let content = b"alpha\nbeta gamma\n\ndelta\nepsilon";

            let mut one_poll = LogTailer::new(dir.path(), "single");
            append(&one_poll.path_for(day(19)), content);
            let expected = one_poll.poll_on(day(19)).expect("poll failed");

            let mut split = LogTailer::new(dir.path(), "split");
            let mut collected = Vec::new();
            let mut written = 0;
            for chunk in content.chunks(3) {
                append(&split.path_for(day(19)), chunk);
                written += chunk.len();
                collected.extend(split.poll_on(day(19)).expect("poll failed"));
            }

            assert_eq!(written, content.len());
            assert_eq!(collected, expected);
            assert_eq!(collected, vec!["alpha", "beta gamma", "", "delta"]);
            assert_eq!(collected.join("\n") + "\n", "alpha\nbeta gamma\n\ndelta\n");
        }

        it "does not re-emit anything when nothing was appended" {
            append(&today, b"one\n");
            tailer.poll_on(day(19)).expect("poll failed");
            assert!(tailer.poll_on(day(19)).expect("poll failed").is_empty());
            assert_eq!(tailer.cursor().expect("cursor").offset, 4);
        }
    }

    describe "truncation" {
        it "restarts from offset zero and drops the discarded fragment" {
            append(&today, b"old line\npartial");
            assert_eq!(tailer.poll_on(day(19)).expect("poll failed"), vec!["old line"]);

            fs::write(&today, b"new\n").expect("Failed to truncate");
            assert_eq!(tailer.poll_on(day(19)).expect("poll failed"), vec!["new"]);
            assert_eq!(tailer.cursor().expect("cursor").offset, 4);
        }
    }

    describe "rotation" {
        it "flushes the old fragment and starts the new file at zero" {
            append(&today, b"a\nunterminated");
            assert_eq!(tailer.poll_on(day(19)).expect("poll failed"), vec!["a"]);

            let tomorrow = tailer.path_for(day(20));
            append(&tomorrow, b"b\n");

            let lines = tailer.poll_on(day(20)).expect("poll failed");
            assert_eq!(lines, vec!["unterminated", "b"]);
            let cursor = tailer.cursor().expect("cursor");
            assert_eq!(cursor.path, tomorrow);
            assert_eq!(cursor.offset, 2);
        }

        it "drains lines the old file gained before switching" {
            append(&today, b"a\n");
            tailer.poll_on(day(19)).expect("poll failed");
            append(&today, b"late\n");

            let lines = tailer.poll_on(day(20)).expect("poll failed");
            assert_eq!(lines, vec!["late"]);
        }

        it "waits for the new file without losing the flushed fragment" {
            append(&today, b"frag");
            tailer.poll_on(day(19)).expect("poll failed");
            assert_eq!(tailer.poll_on(day(20)).expect("poll failed"), vec!["frag"]);
            assert!(tailer.poll_on(day(20)).expect("poll failed").is_empty());
        }
    }
}
