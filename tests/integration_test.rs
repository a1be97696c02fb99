//! Integration tests for the zentinel-wsdl-probe crate.
//!
//! These tests exercise the public API surface end-to-end, combining
//! retrieval, classification, construction and catalog extraction.

use httpmock::prelude::*;
use std::collections::HashSet;
use std::sync::Arc;
use std::time::Duration;
use url::Url;
use zentinel_wsdl_probe::config::{AuditConfig, FetchConfig, WsdlProbeConfig, XxePreventionConfig};
use zentinel_wsdl_probe::error::{ErrorCode, WsdlError};
use zentinel_wsdl_probe::parser::parse_wsdl;
use zentinel_wsdl_probe::{
    Classification, MemoryAuditStore, MemorySource, Parameter, WsdlLoader,
};

// ============================================================================
// Fixtures
// ============================================================================

const CALCULATOR_WSDL: &str = r#"<?xml version="1.0" encoding="UTF-8"?>
<wsdl:definitions xmlns:wsdl="http://schemas.xmlsoap.org/wsdl/"
                  xmlns:soap="http://schemas.xmlsoap.org/wsdl/soap/"
                  xmlns:xsd="http://www.w3.org/2001/XMLSchema"
                  xmlns:tns="urn:calc"
                  targetNamespace="urn:calc">
  <wsdl:types>
    <xsd:schema targetNamespace="urn:calc">
      <xsd:simpleType name="int">
        <xsd:restriction base="xsd:int"/>
      </xsd:simpleType>
    </xsd:schema>
  </wsdl:types>
  <wsdl:message name="AddRequest">
    <wsdl:part name="x" type="tns:int"/>
    <wsdl:part name="y" type="tns:int"/>
  </wsdl:message>
  <wsdl:message name="NegateRequest">
    <wsdl:part name="value" type="tns:int"/>
  </wsdl:message>
  <wsdl:portType name="CalcPortType">
    <wsdl:operation name="Add"><wsdl:input message="tns:AddRequest"/></wsdl:operation>
    <wsdl:operation name="Negate"><wsdl:input message="tns:NegateRequest"/></wsdl:operation>
  </wsdl:portType>
  <wsdl:binding name="CalcBinding" type="tns:CalcPortType">
    <soap:binding style="rpc" transport="http://schemas.xmlsoap.org/soap/http"/>
    <wsdl:operation name="Add">
      <soap:operation soapAction="urn:calc#Add"/>
      <wsdl:input><soap:body use="literal" namespace="urn:calc"/></wsdl:input>
    </wsdl:operation>
    <wsdl:operation name="Negate">
      <soap:operation soapAction="urn:calc#Negate"/>
      <wsdl:input><soap:body use="literal" namespace="urn:calc"/></wsdl:input>
    </wsdl:operation>
  </wsdl:binding>
  <wsdl:service name="ServiceA">
    <wsdl:port name="PortA" binding="tns:CalcBinding">
      <soap:address location="http://host/svcA"/>
    </wsdl:port>
  </wsdl:service>
  <wsdl:service name="ServiceB">
    <wsdl:port name="PortB" binding="tns:CalcBinding">
      <soap:address location="http://host/svcB"/>
    </wsdl:port>
  </wsdl:service>
</wsdl:definitions>"#;

const EMPTY_WSDL: &str = r#"<?xml version="1.0"?>
<definitions xmlns="http://schemas.xmlsoap.org/wsdl/" targetNamespace="urn:nothing">
  <message name="Unused"><part name="p" type="xsd:string"/></message>
</definitions>"#;

fn url(s: &str) -> Url {
    Url::parse(s).unwrap()
}

fn loader_with(
    documents: &[(&str, &str)],
) -> (WsdlLoader, Arc<MemorySource>, Arc<MemoryAuditStore>) {
    let source = Arc::new(MemorySource::new());
    for (uri, body) in documents {
        source.insert(&url(uri), *body);
    }
    let audit = Arc::new(MemoryAuditStore::new());
    let loader = WsdlLoader::new(WsdlProbeConfig::default(), source.clone(), audit.clone());
    (loader, source, audit)
}

// ============================================================================
// Classification
// ============================================================================

#[test]
fn test_probe_rejects_non_xml_without_audit() {
    let documents = [
        ("http://host/page.html", "<html><head><title>x</title></head><body><br></body></html>"),
        ("http://host/data.json", r#"{"services": []}"#),
        ("http://host/empty", ""),
        ("http://host/truncated.wsdl", &CALCULATOR_WSDL[..400]),
    ];
    let (loader, _source, audit) = loader_with(&documents);

    for (uri, _) in &documents {
        let result = loader.probe(&url(uri));
        assert!(
            matches!(result, Classification::NotXml(_)),
            "{} should be NotXml, got {:?}",
            uri,
            result
        );
    }
    assert!(audit.is_empty());
}

#[test]
fn test_probe_rejects_other_xml_vocabularies() {
    let (loader, _source, _audit) = loader_with(&[(
        "http://host/feed.xml",
        r#"<?xml version="1.0"?><rss version="2.0"><channel><title>t</title></channel></rss>"#,
    )]);

    match loader.probe(&url("http://host/feed.xml")) {
        Classification::NotXml(reason) => assert_eq!(reason.code(), ErrorCode::MalformedGrammar),
        other => panic!("expected NotXml, got {:?}", other),
    }
}

#[test]
fn test_probe_zero_services_is_not_a_service() {
    let (loader, _source, audit) = loader_with(&[("http://host/empty?wsdl", EMPTY_WSDL)]);

    assert!(matches!(
        loader.probe(&url("http://host/empty?wsdl")),
        Classification::NotAService
    ));
    assert!(audit.is_empty());
}

#[test]
fn test_probe_valid_document() {
    let (loader, _source, audit) = loader_with(&[("http://host/calc?wsdl", CALCULATOR_WSDL)]);

    let result = loader.probe(&url("http://host/calc?wsdl"));
    assert!(result.is_valid());
    let model = result.into_model(&url("http://host/calc?wsdl")).unwrap();
    assert_eq!(model.services.len(), 2);
    assert!(audit.is_empty());
}

#[test]
fn test_probe_refuses_doctype() {
    let xxe = CALCULATOR_WSDL.replace(
        r#"<?xml version="1.0" encoding="UTF-8"?>"#,
        r#"<?xml version="1.0"?><!DOCTYPE d [<!ENTITY x SYSTEM "file:///etc/passwd">]>"#,
    );
    let (loader, _source, _audit) = loader_with(&[("http://host/xxe?wsdl", xxe.as_str())]);

    match loader.probe(&url("http://host/xxe?wsdl")) {
        Classification::NotXml(reason) => assert_eq!(reason.code(), ErrorCode::UnsafeDocument),
        other => panic!("expected NotXml, got {:?}", other),
    }
}

// ============================================================================
// Construction and audit records
// ============================================================================

#[test]
fn test_construct_records_once_per_call() {
    let (loader, _source, audit) = loader_with(&[("http://host/calc?wsdl", CALCULATOR_WSDL)]);
    let uri = url("http://host/calc?wsdl");

    let first = loader.construct(&uri).unwrap();
    let second = loader.construct(&uri).unwrap();

    // extraction never adds records
    first.operations().unwrap();
    first.discovered_endpoints().unwrap();
    second.parameters("Add").unwrap();

    let records = audit.records_in("soap_actions");
    assert_eq!(records.len(), 2);
    for record in &records {
        assert_eq!(record.title, "SOAP details");
        assert!(record.tags.is_empty());
        assert!(record.body.contains("Service: ServiceA"));
        assert!(record.body.contains("Service: ServiceB"));
        assert!(record.body.contains("Add(x: tns:int, y: tns:int)"));
    }
}

#[test]
fn test_construct_uses_configured_audit_category() {
    let source = Arc::new(MemorySource::new());
    source.insert(&url("http://host/calc?wsdl"), CALCULATOR_WSDL);
    let audit = Arc::new(MemoryAuditStore::new());
    let config = WsdlProbeConfig {
        audit: AuditConfig {
            category: "wsdl".to_string(),
            ..Default::default()
        },
        ..Default::default()
    };
    let loader = WsdlLoader::new(config, source, audit.clone());

    loader.construct(&url("http://host/calc?wsdl")).unwrap();
    assert_eq!(audit.records_in("wsdl").len(), 1);
    assert!(audit.records_in("soap_actions").is_empty());
}

#[test]
fn test_construct_failure_is_invalid_document() {
    let (loader, _source, audit) = loader_with(&[]);

    let err = loader.construct(&url("http://host/gone?wsdl")).err().unwrap();
    assert_eq!(err.code(), ErrorCode::InvalidDocument);
    assert!(audit.is_empty());
}

// ============================================================================
// Catalog extraction
// ============================================================================

#[test]
fn test_two_services_two_endpoints() {
    let (loader, _source, _audit) = loader_with(&[("http://host/calc?wsdl", CALCULATOR_WSDL)]);
    let description = loader.construct(&url("http://host/calc?wsdl")).unwrap();

    let endpoints = description.discovered_endpoints().unwrap();
    let expected: HashSet<Url> = [url("http://host/svcA"), url("http://host/svcB")]
        .into_iter()
        .collect();
    assert_eq!(endpoints, expected);
}

#[test]
fn test_shared_address_reported_once() {
    let shared = CALCULATOR_WSDL.replace("http://host/svcB", "http://host/svcA");
    let (loader, _source, _audit) = loader_with(&[("http://host/calc?wsdl", shared.as_str())]);
    let description = loader.construct(&url("http://host/calc?wsdl")).unwrap();

    let endpoints = description.discovered_endpoints().unwrap();
    assert_eq!(endpoints.len(), 1);
    assert!(endpoints.contains(&url("http://host/svcA")));
}

#[test]
fn test_add_parameters_in_order() {
    let (loader, _source, _audit) = loader_with(&[("http://host/calc?wsdl", CALCULATOR_WSDL)]);
    let description = loader.construct(&url("http://host/calc?wsdl")).unwrap();

    let params = description.parameters("Add").unwrap();
    assert_eq!(
        params,
        vec![
            Parameter {
                name: "x".to_string(),
                type_name: "int".to_string(),
                type_namespace: "urn:calc".to_string(),
            },
            Parameter {
                name: "y".to_string(),
                type_name: "int".to_string(),
                type_namespace: "urn:calc".to_string(),
            },
        ]
    );
}

#[test]
fn test_unknown_operation_always_fails() {
    let (loader, _source, _audit) = loader_with(&[("http://host/calc?wsdl", CALCULATOR_WSDL)]);
    let description = loader.construct(&url("http://host/calc?wsdl")).unwrap();

    assert!(matches!(
        description.parameters("Unknown"),
        Err(WsdlError::UnknownOperation(_))
    ));
    assert!(matches!(
        description.operation("Unknown"),
        Err(WsdlError::UnknownOperation(_))
    ));
}

#[test]
fn test_operations_round_trip() {
    let (loader, _source, _audit) = loader_with(&[("http://host/calc?wsdl", CALCULATOR_WSDL)]);
    let description = loader.construct(&url("http://host/calc?wsdl")).unwrap();

    let operations = description.operations().unwrap();
    assert_eq!(operations.len(), description.model().operations.len());
    assert_eq!(operations.len(), 2);

    for op in &operations {
        let resolved = description.operation(&op.name).unwrap();
        assert_eq!(&resolved, op);
    }

    let negate = operations.iter().find(|op| op.name == "Negate").unwrap();
    assert_eq!(negate.namespace, "urn:calc");
    assert_eq!(negate.soap_action, Some(url("urn:calc#Negate")));
    assert_eq!(negate.location, Some(url("http://host/svcA")));
    assert_eq!(negate.parameters.len(), 1);
    assert_eq!(negate.parameters[0].name, "value");
}

#[test]
fn test_malformed_binding_address_surfaces() {
    let broken = CALCULATOR_WSDL.replace("http://host/svcB", "http://[broken");
    let model = parse_wsdl(&broken, &XxePreventionConfig::default()).unwrap();
    assert_eq!(model.services.len(), 2);

    let (loader, _source, _audit) = loader_with(&[("http://host/calc?wsdl", broken.as_str())]);
    let description = loader.construct(&url("http://host/calc?wsdl")).unwrap();
    let err = description.discovered_endpoints().unwrap_err();
    assert_eq!(err.code(), ErrorCode::MalformedEndpoint);
}

#[test]
fn test_operation_location_skips_ports_without_address() {
    let bare_first = CALCULATOR_WSDL
        .replace(r#"soapAction="urn:calc#Add""#, r#"soapAction="Add""#)
        .replace(
            r#"<wsdl:port name="PortA" binding="tns:CalcBinding">
      <soap:address location="http://host/svcA"/>
    </wsdl:port>"#,
            r#"<wsdl:port name="PortA" binding="tns:CalcBinding"/>"#,
        )
        .replace("http://host/svcB", "http://host/svcB/");
    let (loader, _source, _audit) = loader_with(&[("http://host/calc?wsdl", bare_first.as_str())]);
    let description = loader.construct(&url("http://host/calc?wsdl")).unwrap();

    let add = description.operation("Add").unwrap();
    assert_eq!(add.location, Some(url("http://host/svcB/")));
    assert_eq!(add.soap_action, Some(url("http://host/svcB/Add")));
    assert_eq!(description.operations().unwrap().len(), 2);
    assert_eq!(description.discovered_endpoints().unwrap().len(), 1);
}

// ============================================================================
// End-to-end over HTTP
// ============================================================================

#[test]
fn test_e2e_http_probe_and_construct() {
    let server = MockServer::start();
    let wsdl_mock = server.mock(|when, then| {
        when.method(GET).path("/calc");
        then.status(200)
            .header("Content-Type", "text/xml; charset=utf-8")
            .body(CALCULATOR_WSDL);
    });

    let audit = Arc::new(MemoryAuditStore::new());
    let loader = WsdlLoader::with_http(WsdlProbeConfig::default(), audit.clone()).unwrap();
    let uri = url(&server.url("/calc"));

    assert!(loader.probe(&uri).is_valid());
    let description = loader.construct(&uri).unwrap();

    // probe and construct each load the document
    wsdl_mock.assert_hits(2);
    assert_eq!(description.uri(), &uri);
    assert_eq!(description.discovered_endpoints().unwrap().len(), 2);
    assert_eq!(audit.len(), 1);
}

#[test]
fn test_e2e_http_error_status_is_not_xml() {
    let server = MockServer::start();
    server.mock(|when, then| {
        when.method(GET).path("/secret");
        then.status(403).body("forbidden");
    });

    let audit = Arc::new(MemoryAuditStore::new());
    let loader = WsdlLoader::with_http(WsdlProbeConfig::default(), audit.clone()).unwrap();

    match loader.probe(&url(&server.url("/secret"))) {
        Classification::NotXml(reason) => assert_eq!(reason.code(), ErrorCode::TransportError),
        other => panic!("expected NotXml, got {:?}", other),
    }
    assert!(audit.is_empty());
}

#[test]
fn test_e2e_http_latin1_document_is_valid() {
    let latin1 = CALCULATOR_WSDL
        .replace(r#"encoding="UTF-8""#, r#"encoding="ISO-8859-1""#)
        .replace("<wsdl:types>", "<wsdl:documentation>versi\u{f3}n</wsdl:documentation>\n  <wsdl:types>");
    let body: Vec<u8> = latin1
        .chars()
        .map(|c| u8::try_from(u32::from(c)).unwrap())
        .collect();

    let server = MockServer::start();
    server.mock(|when, then| {
        when.method(GET).path("/latin");
        then.status(200).header("Content-Type", "text/xml").body(body);
    });

    let audit = Arc::new(MemoryAuditStore::new());
    let loader = WsdlLoader::with_http(WsdlProbeConfig::default(), audit.clone()).unwrap();
    let uri = url(&server.url("/latin"));

    assert!(loader.probe(&uri).is_valid());
    let description = loader.construct(&uri).unwrap();
    assert_eq!(description.operations().unwrap().len(), 2);
}

#[test]
fn test_e2e_http_timeout() {
    let server = MockServer::start();
    server.mock(|when, then| {
        when.method(GET).path("/slow");
        then.status(200)
            .delay(Duration::from_secs(3))
            .body(CALCULATOR_WSDL);
    });

    let config = WsdlProbeConfig {
        fetch: FetchConfig {
            timeout_secs: 1,
            ..Default::default()
        },
        ..Default::default()
    };
    let audit = Arc::new(MemoryAuditStore::new());
    let loader = WsdlLoader::with_http(config, audit.clone()).unwrap();
    let uri = url(&server.url("/slow"));

    match loader.probe(&uri) {
        Classification::NotXml(WsdlError::Transport(_)) => {}
        other => panic!("expected NotXml(Transport), got {:?}", other),
    }

    let err = loader.construct(&uri).unwrap_err();
    assert_eq!(err.code(), ErrorCode::InvalidDocument);
    assert!(audit.is_empty());
}

// ============================================================================
// Concurrency
// ============================================================================

#[test]
fn test_parallel_construct_appends_every_record() {
    let (loader, _source, audit) = loader_with(&[("http://host/calc?wsdl", CALCULATOR_WSDL)]);
    let loader = Arc::new(loader);

    let handles: Vec<_> = (0..4)
        .map(|_| {
            let loader = Arc::clone(&loader);
            std::thread::spawn(move || {
                for _ in 0..5 {
                    loader.construct(&url("http://host/calc?wsdl")).unwrap();
                }
            })
        })
        .collect();
    for handle in handles {
        handle.join().unwrap();
    }

    assert_eq!(audit.len(), 20);
}
