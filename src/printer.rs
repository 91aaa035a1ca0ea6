//! Printer command layer and print orchestration.
//!
//! Every command is framed, handed to the [`Transport`] as a write with
//! response, and then awaited: the link reports completion through
//! [`Shared::write_done`](crate::bridge::Shared) and the printer waits at
//! most [`PrintTiming::write_timeout`] for it.  Only one command is in
//! flight at a time.

use embassy_sync::blocking_mutex::raw::RawMutex;
use embassy_time::{with_timeout, Timer};

use crate::bridge::Shared;
use crate::config::{
    PrintSettings, PrintTiming, PAPER_HEIGHT_DOTS, PAPER_WIDTH_DOTS, PROGRESS_LOG_ROWS, ROW_BYTES,
};
use crate::error::{Error, LinkError};
use crate::image::ImageSource;
use crate::protocol::{Command, InfoKey};

/// Where encoded frames go.  `submit` only queues the write; completion
/// is reported separately.
pub trait Transport {
    fn submit(&mut self, frame: &[u8], require_ack: bool) -> Result<(), Error>;
}

pub struct Printer<'a, M: RawMutex, T: Transport> {
    shared: &'a Shared<M>,
    transport: Option<T>,
    settings: PrintSettings,
    timing: PrintTiming,
}

impl<'a, M: RawMutex, T: Transport> Printer<'a, M, T> {
    pub fn new(shared: &'a Shared<M>, settings: PrintSettings, timing: PrintTiming) -> Self {
        Self {
            shared,
            transport: None,
            settings,
            timing,
        }
    }

    pub fn attach(&mut self, transport: T) {
        self.transport = Some(transport);
    }

    pub fn detach(&mut self) -> Option<T> {
        self.transport.take()
    }

    pub fn is_ready(&self) -> bool {
        self.shared.is_ready()
    }

    pub fn settings(&self) -> PrintSettings {
        self.settings
    }

    pub fn set_settings(&mut self, settings: PrintSettings) {
        self.settings = settings;
    }

    /// Frame `cmd`, submit it and wait for the write to complete.
    pub async fn send_command(&mut self, cmd: &Command) -> Result<(), Error> {
        let transport = self.transport.as_mut().ok_or_else(|| {
            error!("printer: no transport attached");
            Error::InvalidState
        })?;
        let frame = cmd.encode().map_err(|e| {
            error!("printer: cannot frame {:?}: {:?}", cmd.code, e);
            Error::InvalidSize
        })?;

        // Discard a completion left over from an earlier, timed-out write.
        self.shared.write_done.reset();
        transport.submit(&frame, true)?;

        match with_timeout(self.timing.write_timeout, self.shared.write_done.wait()).await {
            Ok(true) => Ok(()),
            Ok(false) => {
                error!("printer: write of {:?} failed", cmd.code);
                Err(Error::Link(LinkError::WriteFailed))
            }
            Err(_) => {
                error!("printer: write of {:?} timed out", cmd.code);
                Err(Error::Timeout)
            }
        }
    }

    pub async fn heartbeat(&mut self) -> Result<(), Error> {
        self.send_command(&Command::heartbeat()).await
    }

    pub async fn get_info(&mut self, key: InfoKey) -> Result<(), Error> {
        self.send_command(&Command::get_info(key)).await
    }

    pub async fn set_label_density(&mut self, density: u8) -> Result<(), Error> {
        self.send_command(&Command::set_label_density(density)).await
    }

    pub async fn set_label_type(&mut self, label_type: u8) -> Result<(), Error> {
        self.send_command(&Command::set_label_type(label_type)).await
    }

    pub async fn start_print(&mut self, total_pages: u16, page_color: u8) -> Result<(), Error> {
        self.send_command(&Command::start_print(total_pages, page_color))
            .await
    }

    pub async fn start_page_print(&mut self) -> Result<(), Error> {
        self.send_command(&Command::start_page_print()).await
    }

    pub async fn set_dimension(&mut self, rows: u16, cols: u16, copies: u16) -> Result<(), Error> {
        self.send_command(&Command::set_dimension(rows, cols, copies))
            .await
    }

    pub async fn send_bitmap_row(&mut self, row: u16, pixels: &[u8]) -> Result<(), Error> {
        let cmd = Command::bitmap_row(row, pixels)?;
        self.send_command(&cmd).await
    }

    pub async fn send_empty_row(&mut self, row: u16, count: u8) -> Result<(), Error> {
        self.send_command(&Command::empty_row(row, count)).await
    }

    pub async fn end_page_print(&mut self) -> Result<(), Error> {
        self.send_command(&Command::end_page_print()).await
    }

    pub async fn end_print(&mut self) -> Result<(), Error> {
        self.send_command(&Command::end_print()).await
    }

    pub async fn get_print_status(&mut self) -> Result<(), Error> {
        self.send_command(&Command::get_print_status()).await
    }

    /// Idle status query; does nothing until the session is ready.
    pub async fn keepalive(&mut self) -> Result<(), Error> {
        if !self.is_ready() {
            return Ok(());
        }
        self.get_print_status().await
    }

    /// Print one label.  Rows beyond the label height are dropped.
    ///
    /// Aborts on the first failed write or on an error packet from the
    /// printer; the job is not closed in that case.
    pub async fn print(&mut self, image: &impl ImageSource) -> Result<(), Error> {
        if !self.is_ready() {
            warn!("printer: print requested before ready");
            return Err(Error::NotReady);
        }
        // Stale errors belong to earlier traffic.
        let _ = self.shared.take_device_error();

        let rows = image.height().min(PAPER_HEIGHT_DOTS);
        info!(
            "printer: printing {}x{} ({} rows)",
            image.width(),
            image.height(),
            rows
        );

        let settings = self.settings;
        self.set_label_density(settings.density).await?;
        self.settle().await?;
        self.set_label_type(settings.label_type).await?;
        self.settle().await?;
        self.start_print(1, 0).await?;
        self.settle().await?;
        self.start_page_print().await?;
        self.settle().await?;
        self.set_dimension(rows, PAPER_WIDTH_DOTS, 1).await?;
        self.settle().await?;

        let mut row = [0u8; ROW_BYTES];
        for y in 0..rows {
            image.decode_row(y, &mut row);
            self.send_bitmap_row(y, &row).await?;
            self.check_device()?;
            if (y + 1) % PROGRESS_LOG_ROWS == 0 {
                debug!("printer: row {}/{}", y + 1, rows);
            }
        }

        Timer::after(self.timing.before_end_page).await;
        self.end_page_print().await?;
        Timer::after(self.timing.before_end_print).await;
        self.end_print().await?;
        self.check_device()?;

        info!("printer: print complete");
        Ok(())
    }

    async fn settle(&mut self) -> Result<(), Error> {
        Timer::after(self.timing.settle).await;
        self.check_device()
    }

    fn check_device(&self) -> Result<(), Error> {
        match self.shared.take_device_error() {
            Some(code) => {
                error!("printer: device error {:#x}, aborting", code);
                Err(Error::Device(code))
            }
            None => Ok(()),
        }
    }
}

// ═══════════════════════════════════════════════════════════════════════════
// Unit Tests
// ═══════════════════════════════════════════════════════════════════════════
