//! RFC 7591 dynamic client registration and the registration store.

mod client;
mod request;
mod service;
mod store;

pub use client::{ClientRegistration, ProviderDetails};
pub use request::{
    ClientAuthenticationMethod, DynamicClientRegistrationRequest,
    DynamicClientRegistrationRequestBuilder, GrantType, ResponseType,
};
pub use service::{DynamicClientRegistrar, DynamicClientRegistrationResponse};
pub use store::{ClientRegistrationStore, InMemoryClientRegistrationStore};
