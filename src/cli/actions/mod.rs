pub mod server;

#[derive(Debug)]
pub enum Action {
    Server { port: u16, public_url: String },
}
