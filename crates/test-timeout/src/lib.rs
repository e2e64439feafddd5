use proc_macro::TokenStream;
use quote::quote;
use syn::parse::Parser;
use syn::{Attribute, ItemFn, LitInt, meta::ParseNestedMeta, parse_macro_input};

const DEFAULT_TIMEOUT_SECS: u64 = 30;

struct TestOptions {
    timeout_secs: u64,
    multi_thread: bool,
}

impl Default for TestOptions {
    fn default() -> Self {
        Self {
            timeout_secs: DEFAULT_TIMEOUT_SECS,
            multi_thread: false,
        }
    }
}

impl TestOptions {
    fn parse(&mut self, meta: ParseNestedMeta) -> syn::Result<()> {
        if meta.path.is_ident("secs") {
            let lit: LitInt = meta.value()?.parse()?;
            let secs: u64 = lit.base10_parse()?;
            if secs == 0 {
                return Err(syn::Error::new_spanned(lit, "timeout must be greater than zero"));
            }
            self.timeout_secs = secs;
            Ok(())
        } else if meta.path.is_ident("multi_thread") {
            self.multi_thread = true;
            Ok(())
        } else {
            Err(meta.error("expected `secs = N` or `multi_thread`"))
        }
    }
}

/// Runs an async test on a fresh Tokio runtime in its own thread and fails it
/// once `secs` (default 30) elapse. `multi_thread` selects the multi-threaded
/// runtime for tests whose server and client must make progress in parallel.
///
/// ```ignore
/// #[test_timeout::tokio_timeout_test(secs = 5, multi_thread)]
/// async fn frames_round_trip() { /* ... */ }
/// ```
#[proc_macro_attribute]
pub fn tokio_timeout_test(attr: TokenStream, item: TokenStream) -> TokenStream {
    let mut options = TestOptions::default();
    let parser = syn::meta::parser(|meta| options.parse(meta));
    if let Err(err) = parser.parse(attr) {
        return err.to_compile_error().into();
    }

    let ItemFn {
        attrs,
        vis,
        mut sig,
        block,
    } = parse_macro_input!(item as ItemFn);

    if sig.asyncness.is_none() {
        return syn::Error::new_spanned(
            &sig.ident,
            "tokio_timeout_test can only be applied to async functions",
        )
        .to_compile_error()
        .into();
    }
    sig.asyncness = None;

    let filtered_attrs: Vec<Attribute> = attrs
        .into_iter()
        .filter(|attr| !is_tokio_test_attribute(attr))
        .collect();

    let timeout = options.timeout_secs;
    let builder = if options.multi_thread {
        quote! { tokio::runtime::Builder::new_multi_thread().worker_threads(2) }
    } else {
        quote! { tokio::runtime::Builder::new_current_thread() }
    };

    TokenStream::from(quote! {
        #[test]
        #(#filtered_attrs)*
        #vis #sig {
            let timeout_duration = std::time::Duration::from_secs(#timeout);
            let (sender, receiver) = std::sync::mpsc::channel();
            std::thread::spawn(move || {
                let result = std::panic::catch_unwind(std::panic::AssertUnwindSafe(|| {
                    let runtime = #builder
                        .enable_all()
                        .build()
                        .expect("failed to build Tokio runtime");
                    runtime.block_on(async {
                        tokio::time::timeout(timeout_duration, async move #block)
                            .await
                            .expect("test timed out");
                    });
                }));
                let _ = sender.send(result);
            });
            match receiver.recv_timeout(timeout_duration + std::time::Duration::from_secs(1)) {
                Ok(Ok(_)) => {}
                Ok(Err(payload)) => std::panic::resume_unwind(payload),
                Err(std::sync::mpsc::RecvTimeoutError::Timeout) => panic!("test timed out"),
                Err(std::sync::mpsc::RecvTimeoutError::Disconnected) => {
                    panic!("test thread failed before reporting result")
                }
            }
        }
    })
}

fn is_tokio_test_attribute(attr: &Attribute) -> bool {
    let mut segments = attr.path().segments.iter();
    matches!(
        (segments.next(), segments.next(), segments.next()),
        (Some(first), Some(second), None)
            if first.ident == "tokio" && second.ident == "test"
    )
}
