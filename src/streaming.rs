use anyhow::Result;
use futures::{Stream, StreamExt};
use std::io;

/// Surface that can show the answer being built
pub trait Renderer {
    /// Repaint the whole answer. Calling this twice with the same arguments
    /// leaves the surface unchanged.
    fn render(&mut self, text: &str, show_cursor: bool) -> io::Result<()>;

    /// Release the surface once the answer is complete
    fn finish(&mut self) -> io::Result<()> {
        Ok(())
    }
}

/// Text of the answer received so far
#[derive(Debug, Default, Clone)]
pub struct DisplayBuffer {
    text: String,
}

impl DisplayBuffer {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, chunk: &str) {
        self.text.push_str(chunk);
    }

    pub fn as_str(&self) -> &str {
        &self.text
    }

    pub fn is_empty(&self) -> bool {
        self.text.is_empty()
    }

    pub fn clear(&mut self) {
        self.text.clear();
    }
}

/// Live display of one answer: repainted after every chunk, closed once
pub struct MessageBlock<R: Renderer> {
    buffer: DisplayBuffer,
    renderer: R,
}

impl<R: Renderer> MessageBlock<R> {
    pub fn new(renderer: R) -> Self {
        Self {
            buffer: DisplayBuffer::new(),
            renderer,
        }
    }

    /// Append a chunk and repaint with the cursor shown
    pub fn update(&mut self, chunk: &str) -> io::Result<()> {
        self.buffer.push(chunk);
        if self.buffer.is_empty() {
            return Ok(());
        }
        self.renderer.render(self.buffer.as_str(), true)
    }

    /// Final repaint without the cursor; the buffer is emptied afterwards
    pub fn end(&mut self) -> io::Result<()> {
        self.renderer.render(self.buffer.as_str(), false)?;
        self.renderer.finish()?;
        self.buffer.clear();
        Ok(())
    }

    #[cfg(test)]
    pub fn text(&self) -> &str {
        self.buffer.as_str()
    }

    #[cfg(test)]
    pub fn renderer(&self) -> &R {
        &self.renderer
    }
}

/// Feed every chunk of an answer into `block`.
///
/// The block is not ended here, so callers can close it on both the success
/// and the error path.
pub async fn present<R, S>(block: &mut MessageBlock<R>, chunks: S) -> Result<()>
where
    R: Renderer,
    S: Stream<Item = crate::error::Result<String>> + Unpin,
{
    let mut chunks = chunks;
    while let Some(chunk) = chunks.next().await {
        block.update(&chunk?)?;
    }
    Ok(())
}
