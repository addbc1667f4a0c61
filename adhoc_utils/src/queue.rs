//! Byte I/O on `rtrb` ring buffers.
//!
//! Lets the pumps write straight into, and read straight out of, the free and
//! occupied regions of a ring buffer, which may each be split in two slices.

pub use rtrb;

/// Offers every free slot of `tx` to `fill`, committing the bytes it reports as written.
///
/// `fill` is called on the second half of a wrapped region only if it filled the
/// first one entirely. Returns the total number of bytes committed.
pub fn produce_with<E>(
    tx: &mut rtrb::Producer<u8>,
    mut fill: impl FnMut(&mut [u8]) -> Result<usize, E>,
) -> Result<usize, E> {
    let Ok(mut chunk) = tx.write_chunk(tx.slots()) else {
        return Ok(0);
    };

    let (start, end) = chunk.as_mut_slices();
    let start_len = start.len();

    let n = fill(start)?;

    if n < start_len || end.is_empty() {
        chunk.commit(n);
        return Ok(n);
    }

    match fill(end) {
        Ok(m) => {
            chunk.commit(n + m);
            Ok(n + m)
        }
        Err(e) => {
            // whatever went into the first half is already gone from the source
            chunk.commit(n);
            Err(e)
        }
    }
}

/// Hands every readable byte of `rx` to `drain`, then commits them all.
///
/// Returns the number of bytes consumed.
pub fn consume_with<E>(
    rx: &mut rtrb::Consumer<u8>,
    mut drain: impl FnMut(&[u8]) -> Result<(), E>,
) -> Result<usize, E> {
    let Ok(chunk) = rx.read_chunk(rx.slots()) else {
        return Ok(0);
    };

    let n = chunk.len();
    let (start, end) = chunk.as_slices();

    drain(start)?;
    if !end.is_empty() {
        drain(end)?;
    }

    chunk.commit_all();
    Ok(n)
}
