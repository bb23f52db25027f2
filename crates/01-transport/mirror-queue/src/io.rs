//! `std::io` adapters for the endpoints.
//!
//! A full or empty queue is reported as `ErrorKind::WouldBlock`. `Ok(0)` is only
//! returned for empty buffers, since readers treat it as end of stream.

use std::io::{self, BufRead, Read, Write};

use crate::queue::{Consumer, Producer};

fn would_block() -> io::Error {
    io::Error::from(io::ErrorKind::WouldBlock)
}

impl Write for Producer {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        if buf.is_empty() {
            return Ok(0);
        }
        match Producer::write(self, buf) {
            0 => Err(would_block()),
            written => Ok(written),
        }
    }

    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }
}

impl Read for Consumer {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        if buf.is_empty() {
            return Ok(0);
        }
        match Consumer::read(self, buf) {
            0 => Err(would_block()),
            read => Ok(read),
        }
    }
}

impl BufRead for Consumer {
    fn fill_buf(&mut self) -> io::Result<&[u8]> {
        let available = self.peek();
        if available.is_empty() {
            return Err(would_block());
        }
        Ok(available)
    }

    fn consume(&mut self, amt: usize) {
        self.end_read(amt);
    }
}

#[cfg(all(test, not(feature = "loom")))]
mod tests {
    use super::*;
    use crate::MirrorQueue;

    #[test]
    fn write_all_then_read_exact() {
        let (mut producer, mut consumer) = MirrorQueue::anonymous(64).expect("queue").split();
        producer.write_all(b"through std::io").expect("write_all");
        producer.flush().expect("flush");

        let mut out = [0u8; 15];
        consumer.read_exact(&mut out).expect("read_exact");
        assert_eq!(&out, b"through std::io");
    }

    #[test]
    fn empty_and_full_would_block() {
        let (mut producer, mut consumer) = MirrorQueue::anonymous(1).expect("queue").split();
        let mut out = [0u8; 4];
        let err = Read::read(&mut consumer, &mut out).expect_err("empty");
        assert_eq!(err.kind(), io::ErrorKind::WouldBlock);
        assert_eq!(Read::read(&mut consumer, &mut []).expect("empty buf"), 0);

        let fill = vec![1u8; producer.capacity()];
        assert_eq!(Write::write(&mut producer, &fill).expect("fill"), fill.len());
        let err = Write::write(&mut producer, b"x").expect_err("full");
        assert_eq!(err.kind(), io::ErrorKind::WouldBlock);
    }

    #[test]
    fn buf_read_lines_across_wrap() {
        let (mut producer, mut consumer) = MirrorQueue::anonymous(1).expect("queue").split();
        let capacity = producer.capacity();
        let filler = vec![b'.'; capacity - 4];
        producer.write_all(&filler).expect("filler");
        consumer.consume(filler.len());

        producer.write_all(b"first\nsecond\n").expect("lines");
        let mut line = String::new();
        consumer.read_line(&mut line).expect("first");
        assert_eq!(line, "first\n");
        line.clear();
        consumer.read_line(&mut line).expect("second");
        assert_eq!(line, "second\n");
        assert!(matches!(consumer.fill_buf(), Err(err) if err.kind() == io::ErrorKind::WouldBlock));
    }
}
