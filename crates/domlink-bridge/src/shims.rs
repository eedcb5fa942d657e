//! Host operations a guest module can import.
//!
//! Each shim takes the raw `(ptr, len)` pairs and handles the guest passed,
//! resolves them through the codec and object table, performs exactly one
//! host operation and returns a scalar or fills a result slot pair.
//!
//! Returning `Err` aborts the guest call that triggered the shim. Expected
//! outcomes (no match, unset attribute, dangling handle on a mutation) are
//! values, not errors.

use domlink_core::{DocumentError, Property};

use crate::codec::{self, GuestMemory, Region};
use crate::env::HostEnv;
use crate::error::Result;
use crate::objects::Handle;

/// What a shim needs: guest memory plus the session's host context.
pub trait ShimContext: GuestMemory {
    /// The session's host context.
    fn env(&mut self) -> &mut HostEnv;
}

fn read_str<C: ShimContext + ?Sized>(cx: &mut C, ptr: u32, len: u32) -> Result<String> {
    codec::decode(cx, Region::new(ptr, len))
}

fn check_slots<C: ShimContext + ?Sized>(cx: &mut C, ptr_addr: u32, len_addr: u32) -> Result<()> {
    let view = cx.view()?;
    view.read_u32(ptr_addr)?;
    view.read_u32(len_addr)?;
    Ok(())
}

/// `document.query_selector(ptr, len) -> handle`
///
/// Pushes a new handle for the first match, or returns [`Handle::NULL`].
pub fn query_selector<C: ShimContext + ?Sized>(cx: &mut C, ptr: u32, len: u32) -> Result<Handle> {
    let selector = read_str(cx, ptr, len)?;
    let env = cx.env();
    let handle = match env.document.query_selector(&selector)? {
        Some(node) => env.objects.push(node)?,
        None => Handle::NULL,
    };
    tracing::debug!(%selector, %handle, "query_selector");
    Ok(handle)
}

/// `document.create_element(ptr, len) -> handle`
pub fn create_element<C: ShimContext + ?Sized>(cx: &mut C, ptr: u32, len: u32) -> Result<Handle> {
    let tag = read_str(cx, ptr, len)?;
    let env = cx.env();
    let node = env.document.create_element(&tag)?;
    let handle = env.objects.push(node)?;
    tracing::debug!(%tag, %handle, "create_element");
    Ok(handle)
}

/// `document.create_text_node(ptr, len) -> handle`
pub fn create_text_node<C: ShimContext + ?Sized>(cx: &mut C, ptr: u32, len: u32) -> Result<Handle> {
    let data = read_str(cx, ptr, len)?;
    let env = cx.env();
    let node = env.document.create_text_node(&data);
    let handle = env.objects.push(node)?;
    tracing::debug!(len, %handle, "create_text_node");
    Ok(handle)
}

/// `element.set_attribute(handle, name_ptr, name_len, val_ptr, val_len)`
///
/// A dangling handle, a name outside the allow-list, or an attribute on a
/// text node leaves the document untouched.
pub fn set_attribute<C: ShimContext + ?Sized>(
    cx: &mut C,
    handle: Handle,
    name_ptr: u32,
    name_len: u32,
    value_ptr: u32,
    value_len: u32,
) -> Result<()> {
    let name = read_str(cx, name_ptr, name_len)?;
    let value = read_str(cx, value_ptr, value_len)?;
    let env = cx.env();

    let Some(&node) = env.objects.resolve(handle) else {
        tracing::warn!(%handle, %name, "set_attribute on unresolvable handle ignored");
        return Ok(());
    };
    let property: Property = match name.parse() {
        Ok(p) => p,
        Err(e) => {
            tracing::warn!(%handle, "set_attribute refused: {}", e);
            return Ok(());
        }
    };
    match env.document.set_property(node, &property, &value) {
        Ok(()) => {
            tracing::debug!(%handle, %property, "set_attribute");
            Ok(())
        }
        Err(e @ DocumentError::NotAnElement(_)) => {
            tracing::warn!(%handle, %property, "set_attribute ignored: {}", e);
            Ok(())
        }
        Err(e) => Err(e.into()),
    }
}

/// `element.get_attribute(handle, name_ptr, name_len, out_ptr_addr, out_len_addr) -> bool`
///
/// Returns `false` and writes nothing when the value is unset or empty
/// (also for dangling handles and refused names). Otherwise the value is
/// copied into guest memory and its address and length are stored at
/// `out_ptr_addr` / `out_len_addr`.
pub fn get_attribute<C: ShimContext + ?Sized>(
    cx: &mut C,
    handle: Handle,
    name_ptr: u32,
    name_len: u32,
    out_ptr_addr: u32,
    out_len_addr: u32,
) -> Result<bool> {
    let name = read_str(cx, name_ptr, name_len)?;
    let env = cx.env();

    let Some(&node) = env.objects.resolve(handle) else {
        tracing::warn!(%handle, %name, "get_attribute on unresolvable handle");
        return Ok(false);
    };
    let property: Property = match name.parse() {
        Ok(p) => p,
        Err(e) => {
            tracing::warn!(%handle, "get_attribute refused: {}", e);
            return Ok(false);
        }
    };
    let Some(value) = env.document.property(node, &property) else {
        return Ok(false);
    };

    // Slots are checked before allocating so a bad address cannot strand the copy.
    if let Err(e) = check_slots(cx, out_ptr_addr, out_len_addr) {
        tracing::warn!(%handle, out_ptr_addr, out_len_addr, "get_attribute result slots unusable: {}", e);
        return Err(e);
    }
    let Some(region) = codec::encode_and_store(cx, &value)? else {
        return Ok(false);
    };
    if let Err(e) = codec::write_result_slots(cx, region, out_ptr_addr, out_len_addr) {
        tracing::warn!(%handle, ptr = region.ptr, len = region.len, "get_attribute stranded a copy: {}", e);
        return Err(e);
    }
    tracing::debug!(%handle, %property, len = region.len, "get_attribute");
    Ok(true)
}

/// `node.append_child(parent, child) -> handle`
///
/// Returns [`Handle::NULL`] without touching the tree if either handle
/// does not resolve. Otherwise pushes and returns a fresh handle to the
/// appended child.
pub fn append_child<C: ShimContext + ?Sized>(cx: &mut C, parent: Handle, child: Handle) -> Result<Handle> {
    let env = cx.env();
    let (Some(&parent_node), Some(&child_node)) =
        (env.objects.resolve(parent), env.objects.resolve(child))
    else {
        tracing::warn!(%parent, %child, "append_child with unresolvable handle");
        return Ok(Handle::NULL);
    };
    let appended = env.document.append_child(parent_node, child_node)?;
    let handle = env.objects.push(appended)?;
    tracing::debug!(%parent, %child, %handle, "append_child");
    Ok(handle)
}

/// `event_target.add_event_listener(handle, name_ptr, name_len, dispatch_id)`
pub fn add_event_listener<C: ShimContext + ?Sized>(
    cx: &mut C,
    handle: Handle,
    name_ptr: u32,
    name_len: u32,
    dispatch_id: u32,
) -> Result<()> {
    let event = read_str(cx, name_ptr, name_len)?;
    let env = cx.env();
    match env.objects.resolve(handle) {
        Some(&node) => env.relay.register(node, handle, &event, dispatch_id),
        None => tracing::warn!(
            %handle,
            %event,
            dispatch_id,
            "add_event_listener on unresolvable handle ignored"
        ),
    }
    Ok(())
}

/// `window.alert(ptr, len)`
pub fn alert<C: ShimContext + ?Sized>(cx: &mut C, ptr: u32, len: u32) -> Result<()> {
    let message = read_str(cx, ptr, len)?;
    cx.env().window.alert(&message);
    Ok(())
}

/// `window.console_log(ptr, len)`
pub fn console_log<C: ShimContext + ?Sized>(cx: &mut C, ptr: u32, len: u32) -> Result<()> {
    let message = read_str(cx, ptr, len)?;
    cx.env().window.console_log(&message);
    Ok(())
}

/// `lifecycle.release_object(handle)`. Unknown or repeated releases are ignored.
pub fn release_object<C: ShimContext + ?Sized>(cx: &mut C, handle: Handle) -> Result<()> {
    let released = cx.env().objects.release(handle);
    tracing::debug!(%handle, released, "release_object");
    Ok(())
}

#[cfg(test)]
mod tests {
    use domlink_core::{Document, RecordingWindow, WindowMessage};

    use super::*;
    use crate::error::BridgeError;
    use crate::test_utils::FakeHost;

    fn slot_pair(host: &mut FakeHost) -> (u32, u32) {
        let ptr_addr = host.guest.reserve(4);
        let len_addr = host.guest.reserve(4);
        (ptr_addr, len_addr)
    }

    #[test]
    fn test_query_selector() {
        let mut doc = Document::new();
        let code = doc.create_element("textarea").unwrap();
        doc.set_attribute(code, "id", "code").unwrap();
        doc.append_child(doc.body(), code).unwrap();
        let mut host = FakeHost::with_document(doc);

        let (ptr, len) = host.put_str("#code");
        let first = query_selector(&mut host, ptr, len).unwrap();
        let second = query_selector(&mut host, ptr, len).unwrap();
        assert_eq!(host.env.objects.resolve(first), Some(&code));
        assert_ne!(first, second, "every lookup pushes a fresh handle");

        let (ptr, len) = host.put_str("#missing");
        assert_eq!(query_selector(&mut host, ptr, len).unwrap(), Handle::NULL);
        assert_eq!(host.env.objects.len(), 2);
    }

    #[test]
    fn test_query_selector_invalid_aborts() {
        let mut host = FakeHost::new();
        let (ptr, len) = host.put_str("div >");
        assert!(matches!(
            query_selector(&mut host, ptr, len),
            Err(BridgeError::Document(DocumentError::InvalidSelector { .. }))
        ));
    }

    #[test]
    fn test_create_and_append() {
        let mut host = FakeHost::new();
        let (ptr, len) = host.put_str("ul");
        let list = create_element(&mut host, ptr, len).unwrap();
        let (ptr, len) = host.put_str("item");
        let text = create_text_node(&mut host, ptr, len).unwrap();
        let (ptr, len) = host.put_str("body");
        let body = query_selector(&mut host, ptr, len).unwrap();

        let appended = append_child(&mut host, list, text).unwrap();
        assert!(!appended.is_null());
        assert_ne!(appended, text);
        assert_eq!(host.env.objects.resolve(appended), host.env.objects.resolve(text));
        append_child(&mut host, body, list).unwrap();

        let doc = &host.env.document;
        assert_eq!(doc.render(doc.body()), "<body><ul>item</ul></body>");
    }

    #[test]
    fn test_create_element_invalid_tag_aborts() {
        let mut host = FakeHost::new();
        let (ptr, len) = host.put_str("not a tag");
        assert!(create_element(&mut host, ptr, len).is_err());
        assert!(host.env.objects.is_empty());
    }

    #[test]
    fn test_append_released_child_is_noop() {
        let mut host = FakeHost::new();
        let (ptr, len) = host.put_str("body");
        let body = query_selector(&mut host, ptr, len).unwrap();
        let (ptr, len) = host.put_str("p");
        let child = create_element(&mut host, ptr, len).unwrap();
        release_object(&mut host, child).unwrap();

        let before = host.env.document.render(host.env.document.root());
        let issued = host.env.objects.len();
        assert_eq!(append_child(&mut host, body, child).unwrap(), Handle::NULL);
        assert_eq!(append_child(&mut host, Handle::NULL, body).unwrap(), Handle::NULL);
        assert_eq!(host.env.document.render(host.env.document.root()), before);
        assert_eq!(host.env.objects.len(), issued);
    }

    #[test]
    fn test_get_attribute_unset_writes_nothing() {
        let mut host = FakeHost::new();
        let (ptr, len) = host.put_str("input");
        let input = create_element(&mut host, ptr, len).unwrap();
        let (ptr_addr, len_addr) = slot_pair(&mut host);
        host.guest.write_u32(ptr_addr, 0xAAAA_AAAA);
        host.guest.write_u32(len_addr, 0xBBBB_BBBB);

        let (name_ptr, name_len) = host.put_str("value");
        assert!(!get_attribute(&mut host, input, name_ptr, name_len, ptr_addr, len_addr).unwrap());

        // set to empty: same outcome
        let (value_ptr, _) = host.put_str("x");
        set_attribute(&mut host, input, name_ptr, name_len, value_ptr, 0).unwrap();
        assert!(!get_attribute(&mut host, input, name_ptr, name_len, ptr_addr, len_addr).unwrap());

        assert_eq!(host.guest.allocations(), 0, "nothing was transferred");
        assert_eq!(host.guest.read_u32(ptr_addr), 0xAAAA_AAAA);
        assert_eq!(host.guest.read_u32(len_addr), 0xBBBB_BBBB);
    }

    #[test]
    fn test_set_then_get_attribute() {
        let mut host = FakeHost::new();
        let (ptr, len) = host.put_str("input");
        let input = create_element(&mut host, ptr, len).unwrap();
        let (name_ptr, name_len) = host.put_str("value");
        let (val_ptr, val_len) = host.put_str("mov r1, 5");
        set_attribute(&mut host, input, name_ptr, name_len, val_ptr, val_len).unwrap();

        let (ptr_addr, len_addr) = slot_pair(&mut host);
        assert!(get_attribute(&mut host, input, name_ptr, name_len, ptr_addr, len_addr).unwrap());
        let region = Region::new(host.guest.read_u32(ptr_addr), host.guest.read_u32(len_addr));
        assert_ne!(region.ptr, val_ptr, "result lives in a fresh allocation");
        assert_eq!(codec::decode(&mut host, region).unwrap(), "mov r1, 5");
    }

    #[test]
    fn test_inner_text_property() {
        let mut host = FakeHost::new();
        let (ptr, len) = host.put_str("div");
        let div = create_element(&mut host, ptr, len).unwrap();
        let (name_ptr, name_len) = host.put_str("innerText");
        let (val_ptr, val_len) = host.put_str("42");
        set_attribute(&mut host, div, name_ptr, name_len, val_ptr, val_len).unwrap();

        let node = *host.env.objects.resolve(div).unwrap();
        assert_eq!(host.env.document.text_content(node).as_deref(), Some("42"));
    }

    #[test]
    fn test_disallowed_and_dangling_attributes_ignored() {
        let mut host = FakeHost::new();
        let (ptr, len) = host.put_str("a");
        let link = create_element(&mut host, ptr, len).unwrap();
        let node = *host.env.objects.resolve(link).unwrap();
        let (name_ptr, name_len) = host.put_str("onclick");
        let (val_ptr, val_len) = host.put_str("evil()");
        set_attribute(&mut host, link, name_ptr, name_len, val_ptr, val_len).unwrap();
        assert_eq!(host.env.document.render(node), "<a></a>");

        let (ptr_addr, len_addr) = slot_pair(&mut host);
        assert!(!get_attribute(&mut host, link, name_ptr, name_len, ptr_addr, len_addr).unwrap());

        release_object(&mut host, link).unwrap();
        let (name_ptr, name_len) = host.put_str("title");
        set_attribute(&mut host, link, name_ptr, name_len, val_ptr, val_len).unwrap();
        assert_eq!(host.env.document.render(node), "<a></a>");
        assert!(!get_attribute(&mut host, link, name_ptr, name_len, ptr_addr, len_addr).unwrap());
    }

    #[test]
    fn test_get_attribute_allocation_failure() {
        let mut host = FakeHost::new();
        let (ptr, len) = host.put_str("p");
        let p = create_element(&mut host, ptr, len).unwrap();
        let (name_ptr, name_len) = host.put_str("id");
        let (val_ptr, val_len) = host.put_str("para");
        set_attribute(&mut host, p, name_ptr, name_len, val_ptr, val_len).unwrap();
        let (ptr_addr, len_addr) = slot_pair(&mut host);

        let next = host.guest.allocations() + 1;
        host.guest.set_failing_allocation(next);
        let issued = host.env.objects.len();
        let err = get_attribute(&mut host, p, name_ptr, name_len, ptr_addr, len_addr).unwrap_err();
        assert!(matches!(err, BridgeError::AllocationFailed { len: 4 }));
        assert_eq!(host.env.objects.len(), issued);
        assert!(host.env.objects.resolve(p).is_some());

        // the session carries on
        assert!(get_attribute(&mut host, p, name_ptr, name_len, ptr_addr, len_addr).unwrap());
    }

    #[test]
    fn test_get_attribute_bad_slots_allocate_nothing() {
        let mut host = FakeHost::new();
        let (ptr, len) = host.put_str("p");
        let p = create_element(&mut host, ptr, len).unwrap();
        let (name_ptr, name_len) = host.put_str("id");
        let (val_ptr, val_len) = host.put_str("para");
        set_attribute(&mut host, p, name_ptr, name_len, val_ptr, val_len).unwrap();
        let (ptr_addr, _) = slot_pair(&mut host);

        let before = host.guest.allocations();
        let err = get_attribute(&mut host, p, name_ptr, name_len, ptr_addr, u32::MAX - 1).unwrap_err();
        assert!(matches!(err, BridgeError::MemoryAccess { ptr, len: 4, .. } if ptr == u32::MAX - 1));
        assert_eq!(host.guest.allocations(), before, "no guest memory was handed out");

        let err = get_attribute(&mut host, p, name_ptr, name_len, u32::MAX, ptr_addr).unwrap_err();
        assert!(matches!(err, BridgeError::MemoryAccess { .. }));
        assert_eq!(host.guest.allocations(), before);
    }

    #[test]
    fn test_add_event_listener() {
        let mut host = FakeHost::new();
        let (ptr, len) = host.put_str("button");
        let button = create_element(&mut host, ptr, len).unwrap();
        let (ptr, len) = host.put_str("click");
        add_event_listener(&mut host, button, ptr, len, 3).unwrap();
        add_event_listener(&mut host, Handle::from_raw(42), ptr, len, 4).unwrap();

        let registrations = host.env.relay.registrations();
        assert_eq!(registrations.len(), 1);
        assert_eq!(registrations[0].handle, button);
        assert_eq!(registrations[0].event, "click");
        assert_eq!(registrations[0].dispatch_id, 3);
    }

    #[test]
    fn test_window_output() {
        let window = RecordingWindow::new();
        let mut host = FakeHost::with_window(Document::new(), window.clone());
        let (ptr, len) = host.put_str("Cannot compile");
        alert(&mut host, ptr, len).unwrap();
        let (ptr, len) = host.put_str("step 1");
        console_log(&mut host, ptr, len).unwrap();
        assert_eq!(
            window.messages(),
            vec![
                WindowMessage::Alert("Cannot compile".into()),
                WindowMessage::Log("step 1".into())
            ]
        );
    }

    #[test]
    fn test_release_object_idempotent() {
        let mut host = FakeHost::new();
        let (ptr, len) = host.put_str("div");
        let div = create_element(&mut host, ptr, len).unwrap();
        release_object(&mut host, div).unwrap();
        release_object(&mut host, div).unwrap();
        release_object(&mut host, Handle::from_raw(1000)).unwrap();
        assert_eq!(host.env.objects.resolve(div), None);
        assert_eq!(host.env.objects.live(), 0);
    }
}
