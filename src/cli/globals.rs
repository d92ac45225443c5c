use secrecy::SecretString;

#[derive(Debug, Clone)]
pub struct GlobalArgs {
    pub shortener_endpoint: String,
    pub shortener_api_key: SecretString,
}

impl GlobalArgs {
    #[must_use]
    pub fn new(shortener_endpoint: String) -> Self {
        Self {
            shortener_endpoint,
            shortener_api_key: SecretString::default(),
        }
    }

    pub fn set_api_key(&mut self, key: SecretString) {
        self.shortener_api_key = key;
    }
}
