//! Binary model/checkpoint file I/O.
//!
//! Model file (`.bin`): magic, version, architecture header, then each
//! parameter's rank/shape/size/data in the model's canonical enumeration
//! order. Checkpoint file (`.ckpt`): the same preamble plus iteration,
//! last loss, learning rate, and each parameter's Adam moments `m`/`v`
//! appended after its data. Everything is little-endian; this crate writes
//! with `to_le_bytes`/reads with `from_le_bytes` directly rather than
//! pulling in a byte-order crate for a format this small.

use crate::nn::Model;
use crate::optimizer::Adam;
use crate::shape::Shape;
use crate::tensor::Tensor;
use std::io::{self, BufReader, BufWriter, Read, Write};
use std::path::Path;
use thiserror::Error;

pub const MAGIC: u32 = 0x464C_5558;
pub const VERSION: u32 = 2;

#[derive(Error, Debug)]
pub enum CheckpointError {
    #[error("io error: {0}")]
    Io(#[from] io::Error),
    #[error("header mismatch: {0}")]
    HeaderMismatch(String),
    #[error("shape mismatch: {0}")]
    ShapeMismatch(String),
}

pub type CheckpointResult<T> = Result<T, CheckpointError>;

fn write_u32(w: &mut impl Write, v: u32) -> io::Result<()> {
    w.write_all(&v.to_le_bytes())
}

fn write_i32(w: &mut impl Write, v: i32) -> io::Result<()> {
    w.write_all(&v.to_le_bytes())
}

fn write_f64(w: &mut impl Write, v: f64) -> io::Result<()> {
    w.write_all(&v.to_le_bytes())
}

fn read_u32(r: &mut impl Read) -> io::Result<u32> {
    let mut buf = [0u8; 4];
    r.read_exact(&mut buf)?;
    Ok(u32::from_le_bytes(buf))
}

fn read_i32(r: &mut impl Read) -> io::Result<i32> {
    let mut buf = [0u8; 4];
    r.read_exact(&mut buf)?;
    Ok(i32::from_le_bytes(buf))
}

fn read_f64(r: &mut impl Read) -> io::Result<f64> {
    let mut buf = [0u8; 8];
    r.read_exact(&mut buf)?;
    Ok(f64::from_le_bytes(buf))
}

fn write_header(w: &mut impl Write, model: &Model) -> io::Result<()> {
    let cfg = model.config();
    write_u32(w, MAGIC)?;
    write_u32(w, VERSION)?;
    write_i32(w, cfg.vocab_size as i32)?;
    write_i32(w, cfg.d_model as i32)?;
    write_i32(w, cfg.n_heads as i32)?;
    write_i32(w, cfg.n_layers as i32)?;
    write_i32(w, cfg.d_ff as i32)?;
    write_i32(w, cfg.max_seq_len as i32)?;
    write_i32(w, model.params().len() as i32)
}

struct Header {
    vocab_size: i32,
    d_model: i32,
    n_heads: i32,
    n_layers: i32,
    d_ff: i32,
    max_seq_len: i32,
    n_params: i32,
}

fn read_header(r: &mut impl Read) -> CheckpointResult<Header> {
    let magic = read_u32(r)?;
    if magic != MAGIC {
        return Err(CheckpointError::HeaderMismatch(format!(
            "expected magic {MAGIC:#x}, got {magic:#x}"
        )));
    }
    let version = read_u32(r)?;
    if version != VERSION {
        return Err(CheckpointError::HeaderMismatch(format!(
            "expected version {VERSION}, got {version}"
        )));
    }
    Ok(Header {
        vocab_size: read_i32(r)?,
        d_model: read_i32(r)?,
        n_heads: read_i32(r)?,
        n_layers: read_i32(r)?,
        d_ff: read_i32(r)?,
        max_seq_len: read_i32(r)?,
        n_params: read_i32(r)?,
    })
}

fn check_header_matches(header: &Header, model: &Model) -> CheckpointResult<()> {
    let cfg = model.config();
    let mismatch = header.vocab_size as usize != cfg.vocab_size
        || header.d_model as usize != cfg.d_model
        || header.n_heads as usize != cfg.n_heads
        || header.n_layers as usize != cfg.n_layers
        || header.d_ff as usize != cfg.d_ff
        || header.max_seq_len as usize != cfg.max_seq_len
        || header.n_params as usize != model.params().len();
    if mismatch {
        return Err(CheckpointError::HeaderMismatch(
            "architecture does not match the model being loaded into".into(),
        ));
    }
    Ok(())
}

fn write_tensor(w: &mut impl Write, t: &Tensor) -> io::Result<()> {
    write_i32(w, t.shape().rank() as i32)?;
    for &d in t.shape().dims() {
        write_i32(w, d as i32)?;
    }
    write_i32(w, t.numel() as i32)?;
    for &x in t.data() {
        write_f64(w, x)?;
    }
    Ok(())
}

/// Read a tensor's rank/shape/size/data and check its shape against `expected`.
fn read_tensor_checked(r: &mut impl Read, expected: &Shape) -> CheckpointResult<Vec<f64>> {
    let rank = read_i32(r)? as usize;
    let mut dims = Vec::with_capacity(rank);
    for _ in 0..rank {
        dims.push(read_i32(r)? as usize);
    }
    let size = read_i32(r)? as usize;
    let shape = Shape::new(dims);
    if &shape != expected || size != expected.numel() {
        return Err(CheckpointError::ShapeMismatch(format!(
            "expected shape {expected:?}, file has {shape:?}"
        )));
    }
    let mut data = vec![0.0f64; size];
    for slot in data.iter_mut() {
        *slot = read_f64(r)?;
    }
    Ok(data)
}

fn read_raw_tensor(r: &mut impl Read) -> CheckpointResult<Vec<f64>> {
    let rank = read_i32(r)? as usize;
    for _ in 0..rank {
        read_i32(r)?;
    }
    let size = read_i32(r)? as usize;
    let mut data = vec![0.0f64; size];
    for slot in data.iter_mut() {
        *slot = read_f64(r)?;
    }
    Ok(data)
}

/// Write `model`'s parameters to `path` in the `.bin` model file format.
pub fn save_model(path: impl AsRef<Path>, model: &Model) -> CheckpointResult<()> {
    let mut w = BufWriter::new(std::fs::File::create(path)?);
    write_header(&mut w, model)?;
    for p in model.params().as_slice() {
        write_tensor(&mut w, p.data())?;
    }
    w.flush()?;
    Ok(())
}

/// Overwrite `model`'s parameter data in place from `path`. Rejects files
/// whose header or per-tensor shapes do not match `model`'s architecture.
pub fn load_model(path: impl AsRef<Path>, model: &mut Model) -> CheckpointResult<()> {
    let mut r = BufReader::new(std::fs::File::open(path)?);
    let header = read_header(&mut r)?;
    check_header_matches(&header, model)?;
    for p in model.params_mut().as_mut_slice() {
        let expected = p.shape().clone();
        let data = read_tensor_checked(&mut r, &expected)?;
        p.data_mut().data_mut().copy_from_slice(&data);
    }
    Ok(())
}

/// Write `model` plus `optimizer`'s moment state and run metadata to `path`
/// in the `.ckpt` format.
pub fn save_checkpoint(
    path: impl AsRef<Path>,
    model: &Model,
    optimizer: &Adam,
    iteration: i32,
    last_loss: f64,
    learning_rate: f64,
) -> CheckpointResult<()> {
    let mut w = BufWriter::new(std::fs::File::create(path)?);
    write_header(&mut w, model)?;
    write_i32(&mut w, iteration)?;
    write_f64(&mut w, last_loss)?;
    write_f64(&mut w, learning_rate)?;
    let (m, v) = optimizer.moments();
    for (i, p) in model.params().as_slice().iter().enumerate() {
        write_tensor(&mut w, p.data())?;
        write_tensor(&mut w, &m[i])?;
        write_tensor(&mut w, &v[i])?;
    }
    w.flush()?;
    Ok(())
}

pub struct LoadedCheckpoint {
    pub iteration: i32,
    pub last_loss: f64,
    pub learning_rate: f64,
}

/// Load `path` into `model` and `optimizer` in place; returns the run
/// metadata that accompanied the checkpoint. Save-then-load must leave the
/// model and optimizer ready to produce the same next update as if the
/// round trip had never happened.
pub fn load_checkpoint(
    path: impl AsRef<Path>,
    model: &mut Model,
    optimizer: &mut Adam,
) -> CheckpointResult<LoadedCheckpoint> {
    let mut r = BufReader::new(std::fs::File::open(path)?);
    let header = read_header(&mut r)?;
    check_header_matches(&header, model)?;
    let iteration = read_i32(&mut r)?;
    let last_loss = read_f64(&mut r)?;
    let learning_rate = read_f64(&mut r)?;

    let n = model.params().len();
    let mut m = Vec::with_capacity(n);
    let mut v = Vec::with_capacity(n);
    for p in model.params_mut().as_mut_slice() {
        let expected = p.shape().clone();
        let data = read_tensor_checked(&mut r, &expected)?;
        p.data_mut().data_mut().copy_from_slice(&data);
        let m_data = read_raw_tensor(&mut r)?;
        let v_data = read_raw_tensor(&mut r)?;
        m.push(Tensor::persistent(m_data, expected.clone()));
        v.push(Tensor::persistent(v_data, expected));
    }
    optimizer.restore(m, v, iteration.max(0) as u32);
    Ok(LoadedCheckpoint {
        iteration,
        last_loss,
        learning_rate,
    })
}
