//! Bootstrap protocol: discovering factories and setting up a session.
//!
//! The host enumerates the plug-in's factories, fetches a descriptor, initializes
//! one, creates a document controller for its document, binds plug-in instances to
//! it, and tears everything down in reverse. [`BootstrapClient`] issues these calls;
//! [`BootstrapService`] answers them on the plug-in side.

use crate::caller::RemoteCaller;
use crate::error::{RemoteError, Result};
use crate::handle::{HandleRegistry, RemoteRef};
use crate::method_id::{document_controller, BootstrapCall, Describe};
use arabridge_ipc::{Connection, MessageHandler};
use arabridge_wire::codec::{decode_required, Encode};
use arabridge_wire::payload::{DocumentProperties, FactoryDescriptor, InterfaceConfiguration};
use arabridge_wire::{keys, MessageDecoder, MessageEncoder, MessageId};
use parking_lot::{Mutex, RwLock};
use std::sync::Arc;

/// Roles a plug-in instance can play for a document controller.
pub mod playback_role {
    pub const PLAYBACK_RENDERER: i32 = 1 << 0;
    pub const EDITOR_RENDERER: i32 = 1 << 1;
    pub const EDITOR_VIEW: i32 = 1 << 2;
    pub const ALL: i32 = PLAYBACK_RENDERER | EDITOR_RENDERER | EDITOR_VIEW;
}

// =============================================================================
// Host side
// =============================================================================

/// Host-side bootstrap calls.
#[derive(Clone)]
pub struct BootstrapClient {
    caller: RemoteCaller,
}

impl BootstrapClient {
    pub fn new(connection: Arc<Connection>) -> Self {
        Self {
            caller: RemoteCaller::new(connection),
        }
    }

    pub fn caller(&self) -> &RemoteCaller {
        &self.caller
    }

    pub fn factories_count(&self) -> Result<usize> {
        self.caller.call(BootstrapCall::GetFactoriesCount.id(), ())
    }

    /// Descriptor of factory `index`, `None` if out of range.
    pub fn factory(&self, index: usize) -> Result<Option<FactoryDescriptor>> {
        self.caller.call(BootstrapCall::GetFactory.id(), (index,))
    }

    pub fn factories(&self) -> Result<Vec<FactoryDescriptor>> {
        let count = self.factories_count()?;
        let mut factories = Vec::with_capacity(count);
        for index in 0..count {
            if let Some(factory) = self.factory(index)? {
                factories.push(factory);
            }
        }
        Ok(factories)
    }

    pub fn find_factory(&self, factory_id: &str) -> Result<FactoryDescriptor> {
        self.factories()?
            .into_iter()
            .find(|factory| factory.factory_id == factory_id)
            .ok_or_else(|| RemoteError::UnknownFactory(factory_id.to_string()))
    }

    pub fn initialize(&self, factory_id: &str, configuration: InterfaceConfiguration) -> Result<()> {
        tracing::debug!("Initializing factory {}", factory_id);
        let accepted: bool = self
            .caller
            .call(BootstrapCall::InitializeAra.id(), (factory_id, configuration))?;
        if accepted {
            Ok(())
        } else {
            Err(RemoteError::InitializationRejected(factory_id.to_string()))
        }
    }

    /// Create a document controller for the host's document. `host_instance` is the
    /// host's own reference for the document, echoed back on callbacks.
    pub fn create_document_controller(
        &self,
        factory_id: &str,
        host_instance: RemoteRef,
        properties: &DocumentProperties,
    ) -> Result<RemoteRef> {
        let controller: RemoteRef = self.caller.call(
            BootstrapCall::CreateDocumentControllerWithDocument.id(),
            (factory_id, host_instance, properties),
        )?;
        if controller.is_null() {
            return Err(RemoteError::DocumentControllerRejected(factory_id.to_string()));
        }
        tracing::debug!("Created document controller {:?}", controller);
        Ok(controller)
    }

    pub fn bind_to_document_controller(
        &self,
        controller: RemoteRef,
        known_roles: i32,
        assigned_roles: i32,
    ) -> Result<RemoteRef> {
        let binding: RemoteRef = self.caller.call(
            BootstrapCall::BindToDocumentController.id(),
            (controller, known_roles, assigned_roles),
        )?;
        if binding.is_null() {
            return Err(RemoteError::InvalidHandle(controller));
        }
        Ok(binding)
    }

    pub fn cleanup_binding(&self, binding: RemoteRef) -> Result<()> {
        self.caller
            .call_void(BootstrapCall::CleanupBinding.id(), (binding,))
    }

    pub fn destroy_document_controller(&self, controller: RemoteRef) -> Result<()> {
        self.caller
            .call_void(document_controller::DESTROY_DOCUMENT_CONTROLLER, (controller,))
    }

    pub fn uninitialize(&self, factory_id: &str) -> Result<()> {
        tracing::debug!("Uninitializing factory {}", factory_id);
        self.caller
            .call_void(BootstrapCall::UninitializeAra.id(), (factory_id,))
    }
}

// =============================================================================
// Plug-in side
// =============================================================================

/// The plug-in side's factories and their lifecycle hooks.
pub trait EndpointProvider: Send + Sync {
    fn factories(&self) -> Vec<FactoryDescriptor>;

    fn initialize(&self, factory: &FactoryDescriptor, configuration: &InterfaceConfiguration) -> bool {
        factory.supports_api_generation(configuration.desired_api_generation)
    }

    fn uninitialize(&self, _factory: &FactoryDescriptor) {}

    fn create_document_controller(
        &self,
        _factory: &FactoryDescriptor,
        _properties: &DocumentProperties,
    ) -> bool {
        true
    }
}

/// Endpoint serving a fixed list of factories with the default lifecycle.
#[derive(Debug, Clone, Default)]
pub struct StaticEndpoint {
    factories: Vec<FactoryDescriptor>,
}

impl StaticEndpoint {
    pub fn new(factories: Vec<FactoryDescriptor>) -> Self {
        Self { factories }
    }
}

impl EndpointProvider for StaticEndpoint {
    fn factories(&self) -> Vec<FactoryDescriptor> {
        self.factories.clone()
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct DocumentControllerRecord {
    pub factory_id: String,
    pub host_instance: RemoteRef,
    pub properties: DocumentProperties,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BindingRecord {
    pub controller: RemoteRef,
    pub known_roles: i32,
    pub assigned_roles: i32,
}

#[derive(Default)]
struct ServiceState {
    initialized: Vec<String>,
    controllers: HandleRegistry<DocumentControllerRecord>,
    bindings: HandleRegistry<BindingRecord>,
}

/// Plug-in side [`MessageHandler`] answering the bootstrap protocol.
///
/// Every other message is forwarded to the application handler, if one is set.
pub struct BootstrapService<P> {
    provider: P,
    state: Mutex<ServiceState>,
    application: RwLock<Option<Arc<dyn MessageHandler>>>,
}

impl<P: EndpointProvider> BootstrapService<P> {
    pub fn new(provider: P) -> Self {
        Self {
            provider,
            state: Mutex::new(ServiceState::default()),
            application: RwLock::new(None),
        }
    }

    pub fn provider(&self) -> &P {
        &self.provider
    }

    /// Handler for every message that is not part of the bootstrap protocol.
    pub fn set_application_handler(&self, handler: Arc<dyn MessageHandler>) {
        *self.application.write() = Some(handler);
    }

    pub fn is_initialized(&self, factory_id: &str) -> bool {
        self.state.lock().initialized.iter().any(|id| id == factory_id)
    }

    pub fn document_controller(&self, controller: RemoteRef) -> Option<DocumentControllerRecord> {
        self.state.lock().controllers.get(controller).cloned()
    }

    pub fn document_controller_count(&self) -> usize {
        self.state.lock().controllers.len()
    }

    pub fn binding(&self, binding: RemoteRef) -> Option<BindingRecord> {
        self.state.lock().bindings.get(binding).copied()
    }

    pub fn binding_count(&self) -> usize {
        self.state.lock().bindings.len()
    }

    fn factory(&self, factory_id: &str) -> Option<FactoryDescriptor> {
        self.provider
            .factories()
            .into_iter()
            .find(|factory| factory.factory_id == factory_id)
    }

    fn handle_bootstrap(
        &self,
        call: BootstrapCall,
        decoder: &MessageDecoder,
        reply: &mut MessageEncoder,
    ) -> arabridge_wire::Result<()> {
        tracing::debug!("Handling {}", call.name());
        match call {
            BootstrapCall::GetFactoriesCount => {
                self.provider.factories().len().encode(keys::RETURN_VALUE, reply);
            }
            BootstrapCall::GetFactory => {
                let index: usize = decode_required(0, decoder)?;
                if let Some(factory) = self.provider.factories().get(index) {
                    factory.encode(keys::RETURN_VALUE, reply);
                }
            }
            BootstrapCall::InitializeAra => {
                let factory_id: String = decode_required(0, decoder)?;
                let configuration: InterfaceConfiguration = decode_required(1, decoder)?;
                let accepted = match self.factory(&factory_id) {
                    Some(factory) => self.provider.initialize(&factory, &configuration),
                    None => {
                        tracing::warn!("Host initialized unknown factory {}", factory_id);
                        false
                    }
                };
                if accepted {
                    let mut state = self.state.lock();
                    if !state.initialized.contains(&factory_id) {
                        state.initialized.push(factory_id);
                    }
                }
                accepted.encode(keys::RETURN_VALUE, reply);
            }
            BootstrapCall::CreateDocumentControllerWithDocument => {
                let factory_id: String = decode_required(0, decoder)?;
                let host_instance: RemoteRef = decode_required(1, decoder)?;
                let properties: DocumentProperties = decode_required(2, decoder)?;

                let accepted = self.is_initialized(&factory_id)
                    && self
                        .factory(&factory_id)
                        .is_some_and(|factory| {
                            self.provider.create_document_controller(&factory, &properties)
                        });
                let controller = if accepted {
                    self.state.lock().controllers.insert(DocumentControllerRecord {
                        factory_id,
                        host_instance,
                        properties,
                    })
                } else {
                    RemoteRef::NULL
                };
                controller.encode(keys::RETURN_VALUE, reply);
            }
            BootstrapCall::BindToDocumentController => {
                let controller: RemoteRef = decode_required(0, decoder)?;
                let known_roles: i32 = decode_required(1, decoder)?;
                let assigned_roles: i32 = decode_required(2, decoder)?;

                let mut state = self.state.lock();
                let binding = if state.controllers.contains(controller) {
                    state.bindings.insert(BindingRecord {
                        controller,
                        known_roles,
                        assigned_roles: assigned_roles & known_roles,
                    })
                } else {
                    tracing::warn!("Bind to invalid document controller {:?}", controller);
                    RemoteRef::NULL
                };
                binding.encode(keys::RETURN_VALUE, reply);
            }
            BootstrapCall::CleanupBinding => {
                let binding: RemoteRef = decode_required(0, decoder)?;
                if self.state.lock().bindings.remove(binding).is_none() {
                    tracing::warn!("Cleanup of invalid binding {:?}", binding);
                }
            }
            BootstrapCall::UninitializeAra => {
                let factory_id: String = decode_required(0, decoder)?;
                let removed = {
                    let mut state = self.state.lock();
                    state.initialized.retain(|id| *id != factory_id);
                    let controllers = state
                        .controllers
                        .drain_where(|record| record.factory_id == factory_id);
                    controllers.len()
                };
                if removed > 0 {
                    tracing::warn!(
                        "Factory {} uninitialized with {} live document controller(s)",
                        factory_id,
                        removed
                    );
                }
                if let Some(factory) = self.factory(&factory_id) {
                    self.provider.uninitialize(&factory);
                }
            }
        }
        Ok(())
    }

    fn destroy_document_controller(&self, decoder: &MessageDecoder) -> arabridge_wire::Result<()> {
        let controller: RemoteRef = decode_required(0, decoder)?;
        let mut state = self.state.lock();
        if state.controllers.remove(controller).is_none() {
            tracing::warn!("Destroy of invalid document controller {:?}", controller);
            return Ok(());
        }
        let orphaned = state
            .bindings
            .drain_where(|binding| binding.controller == controller);
        if !orphaned.is_empty() {
            tracing::warn!("{} binding(s) outlived their document controller", orphaned.len());
        }
        Ok(())
    }
}

impl<P: EndpointProvider> MessageHandler for BootstrapService<P> {
    fn handle_received_message(
        &self,
        id: MessageId,
        decoder: &MessageDecoder,
        reply: &mut MessageEncoder,
    ) {
        let result = if let Some(call) = BootstrapCall::from_id(id) {
            self.handle_bootstrap(call, decoder, reply)
        } else if id == document_controller::DESTROY_DOCUMENT_CONTROLLER {
            self.destroy_document_controller(decoder)
        } else {
            let application = self.application.read().clone();
            match application {
                Some(handler) => handler.handle_received_message(id, decoder, reply),
                None => tracing::error!("No handler for {}", Describe(id)),
            }
            Ok(())
        };

        if let Err(e) = result {
            tracing::error!("Malformed {}: {}", Describe(id), e);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::caller::encode_args;
    use arabridge_wire::codec::Decode;
    use arabridge_wire::payload::content_type;

    fn descriptor(id: &str) -> FactoryDescriptor {
        FactoryDescriptor {
            factory_id: id.to_string(),
            plugin_name: "Test".into(),
            manufacturer_name: "Test Audio".into(),
            information_url: String::new(),
            version: "1.0".into(),
            lowest_api_generation: 1,
            highest_api_generation: 2,
            document_archive_id: format!("{}.archive", id),
            compatible_archive_ids: Vec::new(),
            analyzable_content_types: vec![content_type::NOTES],
            supported_playback_transformation_flags: 0,
        }
    }

    fn service() -> BootstrapService<StaticEndpoint> {
        BootstrapService::new(StaticEndpoint::new(vec![descriptor("a"), descriptor("b")]))
    }

    fn invoke(service: &impl MessageHandler, id: MessageId, args: MessageEncoder) -> MessageDecoder {
        let mut reply = MessageEncoder::new();
        service.handle_received_message(id, &MessageDecoder::from(args), &mut reply);
        MessageDecoder::from(reply)
    }

    #[test]
    fn test_factory_enumeration() {
        let service = service();
        let reply = invoke(&service, BootstrapCall::GetFactoriesCount.id(), MessageEncoder::new());
        assert_eq!(usize::decode(0, &reply), Some(2));

        let reply = invoke(&service, BootstrapCall::GetFactory.id(), encode_args(&(1usize,)));
        assert_eq!(FactoryDescriptor::decode(0, &reply).unwrap().factory_id, "b");

        let reply = invoke(&service, BootstrapCall::GetFactory.id(), encode_args(&(5usize,)));
        assert!(reply.is_empty());
    }

    #[test]
    fn test_controller_requires_initialization() {
        let service = service();
        let properties = DocumentProperties::new("Song");
        let create = || {
            invoke(
                &service,
                BootstrapCall::CreateDocumentControllerWithDocument.id(),
                encode_args(&("a", RemoteRef::from_raw(99), &properties)),
            )
        };

        assert_eq!(RemoteRef::decode(0, &create()), Some(RemoteRef::NULL));

        let config = InterfaceConfiguration {
            desired_api_generation: 2,
        };
        let reply = invoke(&service, BootstrapCall::InitializeAra.id(), encode_args(&("a", config)));
        assert_eq!(bool::decode(0, &reply), Some(true));
        assert!(service.is_initialized("a"));

        let controller = RemoteRef::decode(0, &create()).unwrap();
        assert!(!controller.is_null());
        let record = service.document_controller(controller).unwrap();
        assert_eq!(record.host_instance, RemoteRef::from_raw(99));
        assert_eq!(record.properties.name.as_deref(), Some("Song"));
    }

    #[test]
    fn test_initialization_rejected_for_unsupported_generation() {
        let service = service();
        let config = InterfaceConfiguration {
            desired_api_generation: 9,
        };
        let reply = invoke(&service, BootstrapCall::InitializeAra.id(), encode_args(&("a", config)));
        assert_eq!(bool::decode(0, &reply), Some(false));
        assert!(!service.is_initialized("a"));
    }

    #[test]
    fn test_binding_lifecycle() {
        let service = service();
        let config = InterfaceConfiguration {
            desired_api_generation: 1,
        };
        invoke(&service, BootstrapCall::InitializeAra.id(), encode_args(&("b", config)));
        let reply = invoke(
            &service,
            BootstrapCall::CreateDocumentControllerWithDocument.id(),
            encode_args(&("b", RemoteRef::from_raw(1), DocumentProperties::new("x"))),
        );
        let controller = RemoteRef::decode(0, &reply).unwrap();

        let reply = invoke(
            &service,
            BootstrapCall::BindToDocumentController.id(),
            encode_args(&(controller, playback_role::ALL, playback_role::EDITOR_VIEW | 8)),
        );
        let binding = RemoteRef::decode(0, &reply).unwrap();
        assert_eq!(
            service.binding(binding).unwrap().assigned_roles,
            playback_role::EDITOR_VIEW
        );

        invoke(&service, BootstrapCall::CleanupBinding.id(), encode_args(&(binding,)));
        assert_eq!(service.binding_count(), 0);

        invoke(
            &service,
            document_controller::DESTROY_DOCUMENT_CONTROLLER,
            encode_args(&(controller,)),
        );
        assert_eq!(service.document_controller_count(), 0);
    }

    #[test]
    fn test_forwards_other_messages() {
        struct Doubler;
        impl MessageHandler for Doubler {
            fn handle_received_message(
                &self,
                _id: MessageId,
                decoder: &MessageDecoder,
                reply: &mut MessageEncoder,
            ) {
                let value = decoder.read_int32(0).unwrap_or_default();
                reply.append_int32(0, value * 2);
            }
        }

        let service = service();
        service.set_application_handler(Arc::new(Doubler));
        let reply = invoke(
            &service,
            crate::method_id::custom_message_id(1),
            encode_args(&(21i32,)),
        );
        assert_eq!(reply.read_int32(0), Some(42));
    }

    #[test]
    fn test_malformed_bootstrap_call_answers_empty() {
        let service = service();
        let reply = invoke(&service, BootstrapCall::GetFactory.id(), MessageEncoder::new());
        assert!(reply.is_empty());
    }
}
