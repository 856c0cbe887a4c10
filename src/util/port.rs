//! Free-port selection.

use std::io;
use std::net::TcpListener;

/// Ask the OS for a currently unbound local TCP port.
///
/// The port is released before returning, so another process may grab it
/// before the child binds it. That race is accepted; the caller surfaces
/// the resulting bind failure as a startup error.
pub fn free_port() -> io::Result<u16> {
    let listener = TcpListener::bind(("127.0.0.1", 0))?;
    Ok(listener.local_addr()?.port())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn allocates_a_nonzero_port() {
        let port = free_port().unwrap();
        assert!(port > 0);
    }

    #[test]
    fn allocated_port_is_bindable() {
        let port = free_port().unwrap();
        // The listener was dropped, so binding the same port again works.
        TcpListener::bind(("127.0.0.1", port)).unwrap();
    }
}
