use qvquad::Quad;
use std::io;

/// A streaming sink of quads: what every codec serializer provides.
pub trait QuadWriter {
    fn write_quad(&mut self, quad: &Quad) -> io::Result<()>;

    /// Writes every quad of the slice in order.
    fn write_quads(&mut self, quads: &[Quad]) -> io::Result<()> {
        for quad in quads {
            self.write_quad(quad)?;
        }
        Ok(())
    }

    /// Flushes any buffered output.
    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }
}

impl<W: QuadWriter + ?Sized> QuadWriter for Box<W> {
    fn write_quad(&mut self, quad: &Quad) -> io::Result<()> {
        (**self).write_quad(quad)
    }

    fn flush(&mut self) -> io::Result<()> {
        (**self).flush()
    }
}
