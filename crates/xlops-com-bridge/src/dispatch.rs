//! Late-bound COM automation over IDispatch.
//!
//! Excel is driven the way VBScript drives it: members are looked up by
//! name and invoked with VARIANT arguments. [`Variant`] owns a VARIANT and
//! clears it on drop; [`DispatchObject`] owns one interface reference and
//! releases it on drop. Holding them as locals therefore releases every COM
//! reference in reverse order of acquisition.

#![cfg(windows)]

use std::mem::ManuallyDrop;
use std::ptr;

use windows::{
    core::{BSTR, GUID, HSTRING, PCWSTR},
    Win32::{
        Foundation::{DISP_E_EXCEPTION, VARIANT_BOOL},
        Globalization::GetSystemDefaultLCID,
        System::{
            Com::{
                CLSIDFromProgID, CoCreateInstance, IDispatch, CLSCTX_LOCAL_SERVER, DISPATCH_FLAGS,
                DISPATCH_METHOD, DISPATCH_PROPERTYGET, DISPATCH_PROPERTYPUT, DISPPARAMS, EXCEPINFO,
            },
            Ole::DISPID_PROPERTYPUT,
            Variant::{
                VariantClear, VARIANT, VT_BOOL, VT_BSTR, VT_DISPATCH, VT_EMPTY, VT_ERROR, VT_I2,
                VT_I4, VT_NULL, VT_R4, VT_R8,
            },
        },
    },
};

/// An owned VARIANT. Strings and object references it holds are freed on drop.
#[repr(transparent)]
pub struct Variant(VARIANT);

// The VARIANT unions are wrapped in ManuallyDrop, so fields are written
// with ptr::write instead of assignment.
impl Variant {
    pub fn empty() -> Self {
        Self(VARIANT::default())
    }

    pub fn bool(val: bool) -> Self {
        let mut v = VARIANT::default();
        unsafe {
            let inner = &mut *v.Anonymous.Anonymous;
            ptr::write(&mut inner.vt, VT_BOOL);
            ptr::write(
                &mut inner.Anonymous.boolVal,
                VARIANT_BOOL(if val { -1 } else { 0 }),
            );
        }
        Self(v)
    }

    pub fn f64(val: f64) -> Self {
        let mut v = VARIANT::default();
        unsafe {
            let inner = &mut *v.Anonymous.Anonymous;
            ptr::write(&mut inner.vt, VT_R8);
            ptr::write(&mut inner.Anonymous.dblVal, val);
        }
        Self(v)
    }

    pub fn i32(val: i32) -> Self {
        let mut v = VARIANT::default();
        unsafe {
            let inner = &mut *v.Anonymous.Anonymous;
            ptr::write(&mut inner.vt, VT_I4);
            ptr::write(&mut inner.Anonymous.lVal, val);
        }
        Self(v)
    }

    pub fn str(val: &str) -> Self {
        let mut v = VARIANT::default();
        unsafe {
            let inner = &mut *v.Anonymous.Anonymous;
            ptr::write(&mut inner.vt, VT_BSTR);
            ptr::write(&mut inner.Anonymous.bstrVal, ManuallyDrop::new(BSTR::from(val)));
        }
        Self(v)
    }

    /// A VARIANT holding its own reference to `object`.
    pub fn dispatch(object: &DispatchObject) -> Self {
        let mut v = VARIANT::default();
        unsafe {
            let inner = &mut *v.Anonymous.Anonymous;
            ptr::write(&mut inner.vt, VT_DISPATCH);
            ptr::write(
                &mut inner.Anonymous.pdispVal,
                ManuallyDrop::new(Some(object.inner.clone())),
            );
        }
        Self(v)
    }

    pub fn vt(&self) -> u16 {
        unsafe { self.0.Anonymous.Anonymous.vt.0 }
    }

    pub fn as_bool(&self) -> Option<bool> {
        unsafe {
            let inner = &self.0.Anonymous.Anonymous;
            (inner.vt == VT_BOOL).then(|| inner.Anonymous.boolVal.0 != 0)
        }
    }

    /// Any numeric VARIANT Excel hands back, widened to f64.
    pub fn as_f64(&self) -> Option<f64> {
        unsafe {
            let vt = self.0.Anonymous.Anonymous.vt;
            let anon = &self.0.Anonymous.Anonymous.Anonymous;
            match vt {
                VT_R8 => Some(anon.dblVal),
                VT_R4 => Some(anon.fltVal as f64),
                VT_I4 => Some(anon.lVal as f64),
                VT_I2 => Some(anon.iVal as f64),
                _ => None,
            }
        }
    }

    pub fn as_i32(&self) -> Option<i32> {
        self.as_f64().map(|n| n as i32)
    }

    pub fn as_string(&self) -> Option<String> {
        unsafe {
            let inner = &self.0.Anonymous.Anonymous;
            (inner.vt == VT_BSTR).then(|| inner.Anonymous.bstrVal.to_string())
        }
    }

    /// A new reference to the object held, if any. `Nothing` yields `None`.
    pub fn as_dispatch(&self) -> Option<DispatchObject> {
        unsafe {
            let inner = &self.0.Anonymous.Anonymous;
            if inner.vt != VT_DISPATCH {
                return None;
            }
            let disp: &Option<IDispatch> = &inner.Anonymous.pdispVal;
            disp.clone().map(DispatchObject::from_idispatch)
        }
    }

    /// Empty or null.
    pub fn is_empty(&self) -> bool {
        let vt = unsafe { self.0.Anonymous.Anonymous.vt };
        vt == VT_EMPTY || vt == VT_NULL
    }

    /// The SCODE of a VT_ERROR value.
    pub fn error_code(&self) -> Option<i32> {
        unsafe {
            let inner = &self.0.Anonymous.Anonymous;
            (inner.vt == VT_ERROR).then(|| inner.Anonymous.scode)
        }
    }
}

impl Drop for Variant {
    fn drop(&mut self) {
        unsafe {
            let _ = VariantClear(&mut self.0);
        }
    }
}

/// One reference to a COM automation object.
pub struct DispatchObject {
    inner: IDispatch,
}

impl DispatchObject {
    /// Create a COM object from a ProgID such as "Excel.Application".
    pub fn create_from_progid(progid: &str) -> Result<Self, String> {
        unsafe {
            let hstr = HSTRING::from(progid);
            let clsid =
                CLSIDFromProgID(&hstr).map_err(|e| format!("CLSIDFromProgID failed: {e}"))?;
            let disp: IDispatch = CoCreateInstance(&clsid, None, CLSCTX_LOCAL_SERVER)
                .map_err(|e| format!("CoCreateInstance failed for '{progid}': {e}"))?;
            Ok(Self { inner: disp })
        }
    }

    pub fn from_idispatch(disp: IDispatch) -> Self {
        Self { inner: disp }
    }

    /// Look up DISPIDs for a member followed by its named parameters.
    fn dispids(&self, names: &[&str]) -> Result<Vec<i32>, String> {
        let wide: Vec<Vec<u16>> = names
            .iter()
            .map(|n| n.encode_utf16().chain(std::iter::once(0)).collect())
            .collect();
        let pcwstrs: Vec<PCWSTR> = wide.iter().map(|w| PCWSTR(w.as_ptr())).collect();
        let mut ids = vec![0i32; names.len()];
        unsafe {
            self.inner
                .GetIDsOfNames(
                    &GUID::zeroed(),
                    pcwstrs.as_ptr(),
                    names.len() as u32,
                    GetSystemDefaultLCID(),
                    ids.as_mut_ptr(),
                )
                .map_err(|e| format!("GetIDsOfNames({}) failed: {e}", names.join(", ")))?;
        }
        Ok(ids)
    }

    /// Invoke `name` with positional arguments in natural order and
    /// `named` arguments (`What:=...`) by parameter name.
    fn invoke(
        &self,
        name: &str,
        flags: DISPATCH_FLAGS,
        args: Vec<Variant>,
        named: Vec<(&str, Variant)>,
    ) -> Result<Variant, String> {
        let mut names = vec![name];
        names.extend(named.iter().map(|(n, _)| *n));
        let ids = self.dispids(&names)?;

        // DISPPARAMS wants named arguments first, then positional ones reversed
        let mut named_ids: Vec<i32> = ids[1..].to_vec();
        let mut rgvarg: Vec<Variant> = named.into_iter().map(|(_, v)| v).collect();
        rgvarg.extend(args.into_iter().rev());

        self.call(ids[0], name, flags, rgvarg, &mut named_ids)
    }

    fn call(
        &self,
        dispid: i32,
        name: &str,
        flags: DISPATCH_FLAGS,
        mut rgvarg: Vec<Variant>,
        named_ids: &mut [i32],
    ) -> Result<Variant, String> {
        let params = DISPPARAMS {
            rgvarg: if rgvarg.is_empty() {
                ptr::null_mut()
            } else {
                rgvarg.as_mut_ptr() as *mut VARIANT
            },
            rgdispidNamedArgs: if named_ids.is_empty() {
                ptr::null_mut()
            } else {
                named_ids.as_mut_ptr()
            },
            cArgs: rgvarg.len() as u32,
            cNamedArgs: named_ids.len() as u32,
        };
        let mut result = Variant::empty();
        let mut except = EXCEPINFO::default();
        unsafe {
            self.inner
                .Invoke(
                    dispid,
                    &GUID::zeroed(),
                    GetSystemDefaultLCID(),
                    flags,
                    &params,
                    Some(&mut result.0),
                    Some(&mut except),
                    None,
                )
                .map_err(|e| format_invoke_error(e, &except, name))?;
        }
        Ok(result)
    }

    /// `obj.Name`
    pub fn get(&self, name: &str) -> Result<Variant, String> {
        self.invoke(name, DISPATCH_PROPERTYGET, Vec::new(), Vec::new())
    }

    /// `obj.Name = value`
    pub fn put(&self, name: &str, value: Variant) -> Result<(), String> {
        let ids = self.dispids(&[name])?;
        self.call(
            ids[0],
            name,
            DISPATCH_PROPERTYPUT,
            vec![value],
            &mut [DISPID_PROPERTYPUT],
        )?;
        Ok(())
    }

    /// `obj.Name(args...)` as a method call.
    pub fn call_method(&self, name: &str, args: Vec<Variant>) -> Result<Variant, String> {
        self.invoke(name, DISPATCH_METHOD, args, Vec::new())
    }

    /// `obj.Name What:=..., LookAt:=...` as a method call.
    pub fn call_named(
        &self,
        name: &str,
        args: Vec<Variant>,
        named: Vec<(&str, Variant)>,
    ) -> Result<Variant, String> {
        self.invoke(name, DISPATCH_METHOD, args, named)
    }

    /// A child object property such as `app.Workbooks`.
    pub fn child(&self, name: &str) -> Result<DispatchObject, String> {
        expect_object(self.get(name)?, name)
    }

    /// An indexed child such as `Worksheets("Sheet1")`, `Rows(3)` or
    /// `Range("A1", "C1")`.
    pub fn item(&self, name: &str, index: Vec<Variant>) -> Result<DispatchObject, String> {
        let result = self.invoke(name, DISPATCH_PROPERTYGET, index, Vec::new())?;
        expect_object(result, name)
    }

    /// A method returning an object, such as `Workbooks.Add()`.
    pub fn call_object(&self, name: &str, args: Vec<Variant>) -> Result<DispatchObject, String> {
        expect_object(self.call_method(name, args)?, name)
    }
}

fn expect_object(variant: Variant, context: &str) -> Result<DispatchObject, String> {
    if let Some(object) = variant.as_dispatch() {
        Ok(object)
    } else if variant.is_empty() || variant.vt() == VT_DISPATCH.0 {
        Err(format!("'{context}' returned Nothing"))
    } else {
        Err(format!(
            "'{context}' returned non-object VARIANT (VT={}), expected VT_DISPATCH",
            variant.vt()
        ))
    }
}

/// Describe a failed Invoke, using EXCEPINFO when Excel raised an exception.
fn format_invoke_error(err: windows::core::Error, except: &EXCEPINFO, member: &str) -> String {
    if err.code() != DISP_E_EXCEPTION {
        return format!("Invoke('{member}') failed: {err}");
    }
    let desc = if except.bstrDescription.is_empty() {
        String::from("(no description)")
    } else {
        except.bstrDescription.to_string()
    };
    let source = if except.bstrSource.is_empty() {
        String::from("(no source)")
    } else {
        except.bstrSource.to_string()
    };
    format!("COM exception in '{member}': {desc} (source: {source})")
}
