//! Chunked access to one register through a narrower CSR bus.

use log::trace;

use crate::bits::{ceil_log2, low_word, mask};
use crate::csr::{BusParams, CsrTarget, Register, Request, Response};
use crate::error::BuildError;
use crate::router::{MapShape, Subordinate};

/// Splits a register of width `W` into `⌈W/D⌉` chunk addresses on a bus of
/// data width `D`.
///
/// Chunk `i` carries register bits `i*D .. min((i+1)*D, W)`. The chunk index
/// is the low address bits; addresses between the chunk count and the next
/// power of two are silently ignored.
///
/// With atomic reads, reading chunk 0 latches the whole register and the
/// remaining chunks are served from that snapshot. With atomic writes, every
/// chunk but the last is buffered and the last one commits the full value to
/// the register on the same edge.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChunkedAccessMux {
    register: Register,
    data_width: u32,
    chunks: u32,
    read_shadow: u128,
    write_shadow: u128,
    r_data: u64,
}

impl ChunkedAccessMux {
    /// Wraps `register` for a bus of `data_width` bits.
    ///
    /// # Errors
    ///
    /// Returns [`BuildError::InvalidParameter`] when `data_width` is not in
    /// `1..=64`.
    pub fn new(register: Register, data_width: u32) -> Result<Self, BuildError> {
        if data_width == 0 || data_width > 64 {
            return Err(BuildError::invalid("data_width", "between 1 and 64", data_width));
        }
        let chunks = register.width().div_ceil(data_width);
        Ok(Self {
            register,
            data_width,
            chunks,
            read_shadow: 0,
            write_shadow: 0,
            r_data: 0,
        })
    }

    /// Number of chunk addresses carrying data.
    #[must_use]
    pub const fn chunk_count(&self) -> u32 {
        self.chunks
    }

    /// Number of addresses decoded, a power of two.
    #[must_use]
    pub const fn span(&self) -> u64 {
        1 << self.addr_width()
    }

    const fn addr_width(&self) -> u32 {
        ceil_log2(self.chunks as u64)
    }

    /// The wrapped register.
    #[must_use]
    pub const fn register(&self) -> &Register {
        &self.register
    }

    /// Mutable access for internal writes and reset strobes.
    pub fn register_mut(&mut self) -> &mut Register {
        &mut self.register
    }

    /// Unwraps the register.
    #[must_use]
    pub fn into_register(self) -> Register {
        self.register
    }

    fn chunk_bits(&self, chunk: u32) -> (u32, u128) {
        let shift = chunk * self.data_width;
        let width = self.data_width.min(self.register.width() - shift);
        (shift, mask(width) << shift)
    }
}

impl CsrTarget for ChunkedAccessMux {
    fn params(&self) -> BusParams {
        BusParams::new(self.addr_width(), self.data_width)
    }

    fn step(&mut self, request: &Request) -> Response {
        let response = Response {
            r_data: self.r_data,
        };
        let mut r_data = 0;
        let chunk = request.addr & (self.span() - 1);

        if let Ok(chunk) = u32::try_from(chunk) {
            if chunk < self.chunks {
                let (shift, bits) = self.chunk_bits(chunk);
                let last = chunk + 1 == self.chunks;

                if request.r_stb && self.register.access().readable() {
                    let live = self.register.bus_read_value();
                    let source = if self.register.is_atomic_read() {
                        if chunk == 0 {
                            trace!(
                                "`{}`: latched {live:#x} for chunked read",
                                self.register.name()
                            );
                            self.read_shadow = live;
                        }
                        self.read_shadow
                    } else {
                        live
                    };
                    r_data = low_word((source & bits) >> shift);
                }

                if request.w_stb && self.register.access().writable() {
                    let data = (u128::from(request.w_data) << shift) & bits;
                    if !self.register.is_atomic_write() {
                        self.register.write_bits(data, bits);
                    } else if last {
                        let value = (self.write_shadow & !bits) | data;
                        trace!(
                            "`{}`: committing {value:#x} from chunked write",
                            self.register.name()
                        );
                        self.register.write_request(value, true);
                    } else {
                        self.write_shadow = (self.write_shadow & !bits) | data;
                    }
                }
            }
        }

        self.r_data = r_data;
        self.register.clock_edge();
        response
    }
}

impl Subordinate for ChunkedAccessMux {
    fn shape(&self) -> MapShape {
        self.params().shape()
    }
}

#[cfg(test)]
mod tests {
    use super::ChunkedAccessMux;
    use crate::csr::{Access, CsrTarget, Field, RegisterBuilder, Request};
    use crate::error::ErrorKind;

    fn mux(width: u32, access: Access, atomic: bool) -> ChunkedAccessMux {
        let register = RegisterBuilder::new("reg", access)
            .atomic(atomic)
            .field(Field::new("value").with_width(width))
            .and_then(RegisterBuilder::build)
            .expect("valid layout");
        ChunkedAccessMux::new(register, 8).expect("legal width")
    }

    #[test]
    fn chunk_geometry() {
        assert_eq!(mux(20, Access::RW, true).chunk_count(), 3);
        assert_eq!(mux(20, Access::RW, true).span(), 4);
        assert_eq!(mux(8, Access::RW, true).span(), 1);
        assert_eq!(mux(4, Access::RW, true).chunk_count(), 1);
        assert_eq!(mux(16, Access::RW, true).params().addr_width, 1);
    }

    #[test]
    fn atomic_write_commits_on_last_chunk() {
        let mut mux = mux(20, Access::W, true);
        mux.step(&Request::write(0, 0x55));
        assert_eq!(mux.register().read(), 0);
        mux.step(&Request::write(1, 0xaa));
        assert_eq!(mux.register().read(), 0);
        mux.step(&Request::write(2, 0x33));
        assert_eq!(mux.register().read(), 0x3_aa55);
    }

    #[test]
    fn non_atomic_write_lands_per_chunk() {
        let mut mux = mux(20, Access::RW, false);
        mux.step(&Request::write(0, 0x55));
        assert_eq!(mux.register().read(), 0x55);
        mux.step(&Request::write(2, 0xff));
        assert_eq!(mux.register().read(), 0xf_0055);
    }

    #[test]
    fn read_data_follows_strobe_by_one_cycle() {
        let mut mux = mux(20, Access::RW, true);
        mux.register_mut().internal_write_request(0xa_bcde, true);
        mux.step(&Request::idle());
        assert_eq!(mux.step(&Request::read(0)).r_data, 0);
        assert_eq!(mux.step(&Request::read(1)).r_data, 0xde);
        assert_eq!(mux.step(&Request::read(2)).r_data, 0xbc);
        assert_eq!(mux.step(&Request::idle()).r_data, 0x0a);
        assert_eq!(mux.step(&Request::idle()).r_data, 0);
    }

    #[test]
    fn unused_chunk_address_is_ignored() {
        let mut mux = mux(20, Access::RW, false);
        mux.step(&Request::write(3, 0xff));
        assert_eq!(mux.register().read(), 0);
        mux.step(&Request::read(3));
        assert_eq!(mux.step(&Request::idle()).r_data, 0);
    }

    #[test]
    fn write_only_register_reads_zero() {
        let mut mux = mux(8, Access::W, false);
        mux.step(&Request::write(0, 0x5a));
        mux.step(&Request::read(0));
        assert_eq!(mux.step(&Request::idle()).r_data, 0);
        assert_eq!(mux.register().read(), 0x5a);
    }

    #[test]
    fn rejects_zero_data_width() {
        let register = RegisterBuilder::new("r", Access::RW)
            .field(Field::new("f"))
            .and_then(RegisterBuilder::build)
            .expect("valid layout");
        let err = ChunkedAccessMux::new(register, 0).expect_err("zero width");
        assert_eq!(err.kind(), ErrorKind::InvalidParameter);
    }
}
