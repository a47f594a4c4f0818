/// Flow control for incoming datagrams.
pub mod window;
